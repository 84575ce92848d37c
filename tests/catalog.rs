//! End to end tests of the catalog pipeline.
//!
//! Index documents go through the builder, the writer and the reader, and the views of the
//! loaded catalog are compared with what the documents describe.

use apiscope::{prelude::*, Result};
use chrono::NaiveDate;
use uguid::Guid;

const ASSEMBLY: &str = "11111111-0000-0000-0000-000000000001";
const OTHER_ASSEMBLY: &str = "11111111-0000-0000-0000-000000000002";
const NAMESPACE: &str = "22222222-0000-0000-0000-00000000000a";
const CLASS: &str = "22222222-0000-0000-0000-00000000000b";
const METHOD: &str = "22222222-0000-0000-0000-00000000000c";
const PACKAGE: &str = "33333333-0000-0000-0000-000000000001";

fn guid(text: &str) -> Guid {
    Guid::try_parse(text).unwrap()
}

fn runtime_assembly() -> String {
    format!(
        r#"<assembly fingerprint="{ASSEMBLY}" name="System.Runtime" publicKeyToken="b03f5f7f11d50a3a" version="9.0.0.0">
  <api fingerprint="{NAMESPACE}" kind="Namespace" name="N" />
  <api fingerprint="{CLASS}" kind="Class" parent="{NAMESPACE}" name="B" />
  <api fingerprint="{METHOD}" kind="Method" parent="{CLASS}" name="Run()" />
  <syntax id="{CLASS}"><k>public</k> <k>class</k> <t>B</t></syntax>
  <syntax id="{METHOD}"><k>public</k> <k>void</k> Run<p>(</p><p>)</p></syntax>
  <obsolete id="{METHOD}" message="Use Start" diagnosticId="SYSLIB0001" urlFormat="https://aka.ms/{{0}}" />
  <supportedPlatform id="{METHOD}" name="windows" />
  <unsupportedPlatform id="{METHOD}" name="browser" />
  <experimental diagnosticId="SYSLIB5001" />
</assembly>"#
    )
}

fn facade_assembly() -> String {
    format!(
        r#"<assembly fingerprint="{OTHER_ASSEMBLY}" name="System.Runtime.Facade" version="9.0.0.0">
  <api fingerprint="{NAMESPACE}" kind="Namespace" name="N" />
  <api fingerprint="{CLASS}" kind="Class" parent="{NAMESPACE}" name="B" />
  <syntax id="{CLASS}"><k>public</k> <k>class</k> <t>B</t></syntax>
  <supportedPlatform id="{CLASS}" name="windows" />
  <unsupportedPlatform id="{CLASS}" name="browser" />
</assembly>"#
    )
}

fn framework() -> String {
    format!(
        r#"<framework name="net9.0">
  <assembly fingerprint="{ASSEMBLY}" packName="Microsoft.NETCore.App.Ref" />
</framework>"#
    )
}

fn package() -> String {
    format!(
        r#"<package fingerprint="{PACKAGE}" id="Contoso.Facade" version="1.0.0">
  <assembly fingerprint="{OTHER_ASSEMBLY}" framework="netstandard2.0" />
</package>"#
    )
}

fn build(documents: &[String]) -> Result<Vec<u8>> {
    let mut builder = CatalogBuilder::new();
    for document in documents {
        builder.index_str(document)?;
    }
    CatalogWriter::to_bytes(&builder.build()?)
}

#[test]
fn namespace_with_one_class() -> Result<()> {
    let bytes = build(&[
        format!(
            r#"<assembly fingerprint="{ASSEMBLY}" name="System.Runtime">
  <api fingerprint="{NAMESPACE}" kind="Namespace" name="N" />
  <api fingerprint="{CLASS}" kind="Class" parent="{NAMESPACE}" name="B" />
  <syntax id="{CLASS}"><k>public</k> <k>class</k> B</syntax>
</assembly>"#
        ),
        framework(),
    ])?;
    let catalog = ApiCatalog::from_bytes(&bytes)?;

    let roots = catalog.root_apis()?;
    assert_eq!(roots.len(), 1);
    let namespace = roots[0];
    assert_eq!(namespace.name()?, "N");
    assert_eq!(namespace.kind()?, ApiKind::Namespace);
    assert!(namespace.parent()?.is_none());

    let children = namespace.children()?;
    assert_eq!(children.len(), 1);
    let class = children[0];
    assert_eq!(class.fingerprint()?, guid(CLASS));
    assert_eq!(class.full_name()?, "N.B");
    assert_eq!(class.parent()?, Some(namespace));

    let declarations = class.declarations()?;
    assert_eq!(declarations.len(), 1);
    assert_eq!(declarations[0].assembly().fingerprint()?, guid(ASSEMBLY));
    assert_eq!(declarations[0].text()?, "public class B");

    let framework = catalog.framework_by_name("net9.0")?.unwrap();
    let assemblies = framework.assemblies()?;
    assert_eq!(assemblies.len(), 1);
    assert_eq!(assemblies[0].assembly.name()?, "System.Runtime");
    assert_eq!(class.frameworks()?, vec![framework]);

    let assembly = catalog.assembly_by_fingerprint(&guid(ASSEMBLY))?.unwrap();
    assert_eq!(assembly.root_apis()?, vec![namespace]);
    Ok(())
}

#[test]
fn full_catalog_round_trip() -> Result<()> {
    let bytes = build(&[runtime_assembly(), facade_assembly(), framework(), package()])?;
    let catalog = ApiCatalog::from_bytes(&bytes)?;

    let statistics = catalog.statistics();
    assert_eq!(statistics.assemblies, 2);
    assert_eq!(statistics.apis, 3);
    assert_eq!(statistics.root_apis, 1);
    assert_eq!(statistics.frameworks, 2);
    assert_eq!(statistics.packages, 1);
    assert_eq!(statistics.platforms, 2);
    assert_eq!(statistics.obsoletions, 1);
    assert_eq!(statistics.experimentals, 1);
    assert_eq!(statistics.size_compressed, bytes.len());

    let method = catalog.api_by_fingerprint(&guid(METHOD)).unwrap();
    assert_eq!(method.full_name()?, "N.B.Run()");
    let declaration = method.declarations()?[0];
    assert_eq!(declaration.text()?, "public void Run()");

    let obsoletion = declaration.obsoletion()?.unwrap();
    assert_eq!(obsoletion.message, Some("Use Start"));
    assert_eq!(obsoletion.diagnostic_id, Some("SYSLIB0001"));
    assert_eq!(obsoletion.url_format, Some("https://aka.ms/{0}"));
    assert!(!obsoletion.is_error);

    let platforms: Vec<_> = declaration
        .platform_support()?
        .iter()
        .map(|support| (support.platform, support.is_supported))
        .collect();
    assert_eq!(platforms, [("browser", false), ("windows", true)]);
    assert!(declaration.preview_requirement()?.is_none());

    let runtime = declaration.assembly();
    assert_eq!(runtime.public_key_token()?, "b03f5f7f11d50a3a");
    assert_eq!(runtime.version()?, "9.0.0.0");
    assert_eq!(
        runtime.experimental()?.unwrap().diagnostic_id,
        Some("SYSLIB5001")
    );
    assert!(runtime.obsoletion()?.is_none());

    let class = catalog.api_by_fingerprint(&guid(CLASS)).unwrap();
    let declaring: Vec<_> = class
        .declarations()?
        .iter()
        .map(|declaration| declaration.assembly().name())
        .collect::<Result<_>>()?;
    assert_eq!(declaring, ["System.Runtime", "System.Runtime.Facade"]);

    let package = catalog.packages().next().unwrap();
    assert_eq!(package.name()?, "Contoso.Facade");
    let (target, assembly) = package.assemblies()?[0];
    assert_eq!(target.name()?, "netstandard2.0");
    assert_eq!(assembly.fingerprint()?, guid(OTHER_ASSEMBLY));
    assert_eq!(assembly.packages()?, vec![package]);
    Ok(())
}

#[test]
fn assembly_declarations_are_in_preorder() -> Result<()> {
    let bytes = build(&[runtime_assembly(), facade_assembly()])?;
    let catalog = ApiCatalog::from_bytes(&bytes)?;

    let runtime = catalog.assembly_by_fingerprint(&guid(ASSEMBLY))?.unwrap();
    let names: Vec<_> = runtime
        .declarations()?
        .iter()
        .map(|declaration| declaration.api().name())
        .collect::<Result<_>>()?;
    assert_eq!(names, ["B", "Run()"]);

    let facade = catalog.assembly_by_fingerprint(&guid(OTHER_ASSEMBLY))?.unwrap();
    assert_eq!(facade.declarations()?.len(), 1);
    Ok(())
}

#[test]
fn handles_follow_catalog_order() -> Result<()> {
    let bytes = build(&[runtime_assembly(), framework()])?;
    let catalog = ApiCatalog::from_bytes(&bytes)?;

    for (index, api) in catalog.apis().enumerate() {
        assert_eq!(api.handle(), index as i32);
        assert_eq!(catalog.api(api.handle())?, api);
        if let Some(parent) = api.parent()? {
            assert!(parent.handle() < api.handle());
        }
    }
    assert!(catalog.api(catalog.statistics().apis as i32).is_err());
    assert!(catalog.api(-1).is_err());
    Ok(())
}

#[test]
fn shared_platform_lists_are_stored_once() -> Result<()> {
    let single = ApiCatalog::from_bytes(&build(&[runtime_assembly()])?)?;
    let both = ApiCatalog::from_bytes(&build(&[runtime_assembly(), facade_assembly()])?)?;

    // The facade's list equals the one of Run() in System.Runtime, only the syntax is new.
    let class = both.api_by_fingerprint(&guid(CLASS)).unwrap();
    let facade = both.assembly_by_fingerprint(&guid(OTHER_ASSEMBLY))?.unwrap();
    assert_eq!(
        class.declaration_in(facade)?.unwrap().platform_support()?.len(),
        2
    );
    assert_eq!(both.statistics().platform_supports, 2);

    let mut syntax_only = CatalogBuilder::new();
    syntax_only.index_str(&runtime_assembly())?;
    syntax_only.index_str(&facade_assembly().replace(
        &format!(
            "  <supportedPlatform id=\"{CLASS}\" name=\"windows\" />\n  <unsupportedPlatform id=\"{CLASS}\" name=\"browser\" />\n"
        ),
        "",
    ))?;
    let syntax_only = ApiCatalog::from_bytes(&CatalogWriter::to_bytes(&syntax_only.build()?)?)?;

    assert_eq!(
        both.statistics().blob_heap_size,
        syntax_only.statistics().blob_heap_size
    );
    assert!(single.statistics().blob_heap_size < both.statistics().blob_heap_size);
    Ok(())
}

#[test]
fn indexing_twice_changes_nothing() -> Result<()> {
    let once = build(&[runtime_assembly(), framework()])?;

    let mut builder = CatalogBuilder::new();
    for document in [runtime_assembly(), runtime_assembly(), framework(), framework()] {
        builder.index_str(&document)?;
    }
    assert!(!builder.diagnostics().has_errors());
    let twice = CatalogWriter::to_bytes(&builder.build()?)?;

    assert_eq!(once, twice);
    Ok(())
}

#[test]
fn usage_is_attached_to_apis() -> Result<()> {
    let mut builder = CatalogBuilder::new();
    builder.index_str(&runtime_assembly())?;
    builder.define_usage_source("nuget.org", NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())?;
    builder.define_usage_source("Planning", NaiveDate::from_ymd_opt(2023, 11, 14).unwrap())?;
    builder.add_usage("nuget.org", guid(CLASS), 0.5)?;
    builder.add_usage("Planning", guid(CLASS), 0.25)?;
    builder.add_usage("nuget.org", guid(METHOD), 0.125)?;
    builder.add_usage("nuget.org", guid(METHOD), 2.0)?;
    assert_eq!(builder.diagnostics().error_count(), 1);

    let catalog = ApiCatalog::from_bytes(&CatalogWriter::to_bytes(&builder.build()?)?)?;
    let sources: Vec<_> = catalog
        .usage_sources()
        .map(|source| Ok::<_, Error>((source.name()?, source.date()?)))
        .collect::<Result<_>>()?;
    assert_eq!(
        sources,
        [
            ("nuget.org", NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()),
            ("Planning", NaiveDate::from_ymd_opt(2023, 11, 14).unwrap()),
        ]
    );

    let class = catalog.api_by_fingerprint(&guid(CLASS)).unwrap();
    let mut usages: Vec<_> = class
        .usages()?
        .iter()
        .map(|(source, share)| Ok::<_, Error>((source.name()?, *share)))
        .collect::<Result<_>>()?;
    usages.sort_by(|a, b| a.0.cmp(b.0));
    assert_eq!(usages, [("Planning", 0.25), ("nuget.org", 0.5)]);

    let method = catalog.api_by_fingerprint(&guid(METHOD)).unwrap();
    assert_eq!(method.usages()?.len(), 1);
    assert_eq!(method.usages()?[0].1, 0.125);

    let namespace = catalog.api_by_fingerprint(&guid(NAMESPACE)).unwrap();
    assert!(namespace.usages()?.is_empty());
    Ok(())
}

#[test]
fn catalog_file_round_trip() -> Result<()> {
    let mut builder = CatalogBuilder::new();
    builder.index_str(&runtime_assembly())?;
    let intermediate = builder.build()?;

    let path = std::env::temp_dir().join(format!("apiscope-{}.dat", std::process::id()));
    CatalogWriter::write_file(&intermediate, &path)?;
    let catalog = ApiCatalog::open(&path);
    let _ = std::fs::remove_file(&path);

    let catalog = catalog?;
    assert_eq!(catalog.statistics().apis, intermediate.api_count());
    Ok(())
}

#[test]
fn damaged_catalogs_are_rejected() -> Result<()> {
    let bytes = build(&[runtime_assembly()])?;

    assert!(matches!(ApiCatalog::from_bytes(&[]), Err(Error::Empty)));

    let mut version = bytes.clone();
    version[4] = 2;
    assert!(matches!(
        ApiCatalog::from_bytes(&version),
        Err(Error::NotSupported)
    ));

    let mut magic = bytes.clone();
    magic[0] ^= 0xFF;
    assert!(matches!(
        ApiCatalog::from_bytes(&magic),
        Err(Error::Malformed { .. })
    ));

    let truncated = &bytes[..bytes.len() - 8];
    assert!(ApiCatalog::from_bytes(truncated).is_err());
    Ok(())
}
