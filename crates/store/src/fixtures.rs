//! Small catalogs shared by the unit tests.

use apicat_build::CatalogBuilder;
use apicat_model::{ApiKind, CatalogModel, Fingerprint, Markup};

pub const FRAMEWORK: &str = "net8.0";
pub const OTHER_FRAMEWORK: &str = "net9.0";

pub fn api(id: &str) -> Fingerprint {
    Fingerprint::of_api(id)
}

pub fn runtime() -> Fingerprint {
    Fingerprint::of_api("assembly:System.Runtime")
}

pub fn library() -> Fingerprint {
    Fingerprint::of_api("assembly:Contoso.Lib")
}

pub fn package() -> Fingerprint {
    Fingerprint::of_package("Contoso.Lib", "1.0.0")
}

fn class(name: &str) -> String {
    Markup::builder().keyword("public").space().keyword("class").space().reference(name, api("T:N.T")).build().to_text()
}

fn method(parameters: &[&str]) -> String {
    let mut markup = Markup::builder().keyword("public").space().keyword("void").space().unresolved("M").punctuation("(");
    for (index, parameter) in parameters.iter().enumerate() {
        if index > 0 {
            markup = markup.punctuation(",").space();
        }
        markup = markup.keyword(*parameter);
    }
    markup.punctuation(")").punctuation(";").build().to_text()
}

fn namespace() -> String {
    Markup::builder().keyword("namespace").space().unresolved("N").build().to_text()
}

/// `N`, `N.T` and `N.T.M()` shipped in-box by two frameworks, plus a package
/// for the first framework that redeclares `N.T` and adds `N.T.M(int)`.
pub fn model() -> CatalogModel {
    let mut builder = CatalogBuilder::new();
    builder.define_framework(FRAMEWORK);
    builder.define_framework(OTHER_FRAMEWORK);
    builder.define_api(api("N:N"), ApiKind::Namespace.ordinal(), None, "N");
    builder.define_api(api("T:N.T"), ApiKind::Class.ordinal(), Some(api("N:N")), "T");
    builder.define_api(api("M:N.T.M"), ApiKind::Method.ordinal(), Some(api("T:N.T")), "M()");
    builder.define_api(api("M:N.T.M(System.Int32)"), ApiKind::Method.ordinal(), Some(api("T:N.T")), "M(int)");

    builder.define_assembly(runtime(), "System.Runtime", "8.0.0.0", "b03f5f7f11d50a3a");
    builder.define_framework_assembly(FRAMEWORK, runtime());
    builder.define_framework_assembly(OTHER_FRAMEWORK, runtime());
    builder.define_declaration(runtime(), api("N:N"), &namespace());
    builder.define_declaration(runtime(), api("T:N.T"), &class("T"));
    builder.define_declaration(runtime(), api("M:N.T.M"), &method(&[]));

    builder.define_package(package(), "Contoso.Lib", "1.0.0");
    builder.define_assembly(library(), "Contoso.Lib", "1.0.0.0", "");
    builder.define_package_assembly(package(), FRAMEWORK, library());
    builder.define_declaration(library(), api("N:N"), &namespace());
    builder.define_declaration(library(), api("T:N.T"), &class("T"));
    builder.define_declaration(library(), api("M:N.T.M"), &method(&[]));
    builder.define_declaration(library(), api("M:N.T.M(System.Int32)"), &method(&["int"]));

    let build = builder.commit();
    assert!(build.report.is_clean(), "{}", build.report);
    build.model
}
