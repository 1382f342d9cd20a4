//! Catalogs built from index documents for the diff tests.

use apicat_build::CatalogBuilder;
use apicat_model::{
    ApiKind, ApiRecord, AssemblyRecord, DeclarationRecord, Fingerprint, FrameworkDocument, IndexDocument, Markup,
    PackageDocument,
};
use apicat_store::{Catalog, Compression, encode};

pub fn api(id: &str) -> Fingerprint {
    Fingerprint::of_api(id)
}

fn record(id: &str, kind: ApiKind, parent: Option<&str>, name: &str) -> ApiRecord {
    ApiRecord { fingerprint: api(id), kind: kind.ordinal(), parent: parent.map(api), name: name.to_string() }
}

fn declare(id: &str, markup: Markup) -> DeclarationRecord {
    DeclarationRecord { api_fingerprint: api(id), markup_text: markup.to_text() }
}

fn assembly(name: &str, version: &str, framework: Option<&str>, declarations: Vec<DeclarationRecord>) -> AssemblyRecord {
    AssemblyRecord {
        fingerprint: Fingerprint::of_api(&format!("assembly:{name}/{version}")),
        name: name.to_string(),
        version: version.to_string(),
        public_key_token: String::new(),
        framework: framework.map(str::to_string),
        declarations,
    }
}

fn namespace() -> Markup {
    Markup::builder().keyword("namespace").space().unresolved("N").build()
}

fn class(name: &str) -> Markup {
    Markup::builder().keyword("public").space().keyword("class").space().unresolved(name).build()
}

fn method(returns: &str, parameter: Option<&str>) -> Markup {
    let builder = Markup::builder().keyword("public").space().keyword(returns).space().unresolved("M").punctuation("(");
    let builder = match parameter {
        Some(parameter) => builder.keyword(parameter),
        None => builder,
    };
    builder.punctuation(")").punctuation(";").build()
}

fn property() -> Markup {
    Markup::builder()
        .keyword("public")
        .space()
        .keyword("int")
        .space()
        .unresolved("P")
        .space()
        .punctuation("{")
        .space()
        .keyword("get")
        .punctuation(";")
        .space()
        .punctuation("}")
        .build()
}

fn getter() -> Markup {
    Markup::builder().keyword("get").punctuation(";").build()
}

/// `net8.0` ships `N`, `N.T`, `N.T.M()` and `N.U`. `net9.0` drops `N.U`,
/// changes the return type of `N.T.M()` and adds the property `N.T.P`.
/// `Contoso.Lib` 1.0.0 redeclares `N.T` for `net8.0` with the extra overload
/// `N.T.M(int)`.
pub fn documents() -> Vec<IndexDocument> {
    let apis = || {
        vec![
            record("N:N", ApiKind::Namespace, None, "N"),
            record("T:N.T", ApiKind::Class, Some("N:N"), "T"),
            record("M:N.T.M", ApiKind::Method, Some("T:N.T"), "M()"),
        ]
    };

    let mut net8_apis = apis();
    net8_apis.push(record("T:N.U", ApiKind::Class, Some("N:N"), "U"));
    let net8 = FrameworkDocument {
        name: "net8.0".to_string(),
        apis: net8_apis,
        assemblies: vec![assembly("System.Runtime", "8.0.0.0", None, vec![
            declare("N:N", namespace()),
            declare("T:N.T", class("T")),
            declare("M:N.T.M", method("void", None)),
            declare("T:N.U", class("U")),
        ])],
    };

    let mut net9_apis = apis();
    net9_apis.push(record("P:N.T.P", ApiKind::Property, Some("T:N.T"), "P"));
    net9_apis.push(record("M:N.T.get_P", ApiKind::PropertyGetter, Some("P:N.T.P"), "get"));
    let net9 = FrameworkDocument {
        name: "net9.0".to_string(),
        apis: net9_apis,
        assemblies: vec![assembly("System.Runtime", "9.0.0.0", None, vec![
            declare("N:N", namespace()),
            declare("T:N.T", class("T")),
            declare("M:N.T.M", method("int", None)),
            declare("P:N.T.P", property()),
            declare("M:N.T.get_P", getter()),
        ])],
    };

    let mut package_apis = apis();
    package_apis.push(record("M:N.T.M(System.Int32)", ApiKind::Method, Some("T:N.T"), "M(int)"));
    let package = PackageDocument {
        fingerprint: Fingerprint::of_package("Contoso.Lib", "1.0.0"),
        id: "Contoso.Lib".to_string(),
        version: "1.0.0".to_string(),
        apis: package_apis,
        assemblies: vec![assembly("Contoso.Lib", "1.0.0.0", Some("net8.0"), vec![
            declare("N:N", namespace()),
            declare("T:N.T", class("T")),
            declare("M:N.T.M", method("void", None)),
            declare("M:N.T.M(System.Int32)", method("void", Some("int"))),
        ])],
    };

    vec![IndexDocument::Framework(net8), IndexDocument::Package(package), IndexDocument::Framework(net9)]
}

pub fn catalog() -> Catalog {
    let mut builder = CatalogBuilder::new();
    for document in documents() {
        builder.ingest(&document);
    }
    let build = builder.commit();
    assert!(build.report.is_clean(), "{}", build.report);
    Catalog::from_bytes(&encode(&build.model, Compression::Deflate).unwrap()).unwrap()
}
