use std::collections::BTreeMap;

use need::{
    Actions,
    Declaration,
    Document,
    Error,
    FieldDecl,
    FieldList,
    IndexDefinition,
    IndexRegistry,
    ManagerKind,
    ModelFieldKind,
    ModelMeta,
    Need,
    NeedConfig,
    Settings,
};

const TEXT: &[&str] = &["title", "body"];

fn settings(tmp: &tempfile::TempDir) -> Settings {
    Settings::resolve(Some(tmp.path()))
        .unwrap()
        .with_writer_memory(15_000_000)
}

fn article_definition() -> IndexDefinition {
    let decl = Declaration::new("ArticleNeed")
        .field("slug", FieldDecl::id().unique().stored())
        .field("title", FieldDecl::text().stored())
        .field("section", FieldDecl::id().stored())
        .field("body", FieldDecl::text());
    IndexDefinition::new("news.need", decl)
        .app_label("news")
        .fields(["slug", "title", "section", "body"])
}

fn article(slug: &str, title: &str, section: &str) -> Document {
    Document::new()
        .with("slug", slug)
        .with("title", title)
        .with("section", section)
        .with("body", format!("{title} in the {section} section"))
}

fn titles<M: Actions>(
    need: &Need<M>,
    fields: &[&str],
    query: &str,
) -> Vec<String> {
    need.actions()
        .read(fields, query, |hits| {
            hits.iter()
                .map(|hit| hit.unwrap().get("title").unwrap().to_string())
                .collect()
        })
        .unwrap()
}

fn paper_model() -> ModelMeta {
    ModelMeta::new("Paper", "id")
        .field("id", ModelFieldKind::Auto)
        .field("title", ModelFieldKind::Char)
        .field("doi", ModelFieldKind::Url)
}

fn paper(id: &str, title: &str) -> BTreeMap<String, String> {
    let mut record = BTreeMap::new();
    record.insert("id".to_string(), id.to_string());
    record.insert("title".to_string(), title.to_string());
    record.insert("doi".to_string(), format!("https://doi.org/{id}"));
    record.insert("notes".to_string(), "not indexed".to_string());
    record
}

#[test]
fn resolve_creates_the_index_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let need = Need::resolve(&article_definition(), &settings(&tmp)).unwrap();

    assert_eq!(need.options().index_name, "news_ArticleNeed");
    assert!(tmp.path().join("news_ArticleNeed").is_dir());
    assert_eq!(need.actions().size().unwrap(), 0);
}

#[test]
fn resolving_twice_reuses_the_existing_index() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(&tmp);
    let first = Need::resolve(&article_definition(), &settings).unwrap();
    first
        .actions()
        .add(&article("a", "Borrow checker tales", "rust"))
        .unwrap();

    let second = Need::resolve(&article_definition(), &settings).unwrap();
    assert_eq!(second.actions().size().unwrap(), 1);
}

#[test]
fn add_then_read_finds_the_document() {
    let tmp = tempfile::tempdir().unwrap();
    let need = Need::resolve(&article_definition(), &settings(&tmp)).unwrap();

    need.actions()
        .add(&article("a", "Borrow checker tales", "rust"))
        .unwrap();
    need.actions()
        .add(&article("b", "Garbage collector tales", "java"))
        .unwrap();

    assert_eq!(titles(&need, TEXT, "borrow"), ["Borrow checker tales"]);
    assert_eq!(titles(&need, TEXT, "tales").len(), 2);
    assert!(titles(&need, TEXT, "haskell").is_empty());
}

#[test]
fn hits_only_expose_stored_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let need = Need::resolve(&article_definition(), &settings(&tmp)).unwrap();
    need.actions()
        .add(&article("a", "Borrow checker tales", "rust"))
        .unwrap();

    let hit = need
        .actions()
        .read(&["body"], "section", |hits| hits.get(0).unwrap().unwrap())
        .unwrap();
    assert_eq!(hit.get("slug"), Some("a"));
    assert_eq!(hit.get("section"), Some("rust"));
    assert_eq!(hit.get("body"), None);
    assert!(hit.score > 0.0);
}

#[test]
fn read_limited_caps_the_hit_count() {
    let tmp = tempfile::tempdir().unwrap();
    let need = Need::resolve(&article_definition(), &settings(&tmp)).unwrap();
    let docs: Vec<Document> = (0..15)
        .map(|i| article(&format!("s{i}"), &format!("Tale {i}"), "misc"))
        .collect();
    need.actions().bulk_add(&docs).unwrap();

    let default = need
        .actions()
        .read(&["title"], "tale", |hits| hits.len())
        .unwrap();
    let limited = need
        .actions()
        .read_limited(&["title"], "tale", 3, |hits| hits.len())
        .unwrap();
    let all = need
        .actions()
        .read_limited(&["title"], "tale", 100, |hits| hits.len())
        .unwrap();

    assert_eq!(default, 10);
    assert_eq!(limited, 3);
    assert_eq!(all, 15);
}

#[test]
fn merge_replaces_documents_sharing_a_unique_value() {
    let tmp = tempfile::tempdir().unwrap();
    let need = Need::resolve(&article_definition(), &settings(&tmp)).unwrap();

    need.actions()
        .merge(&article("a", "First draft", "rust"))
        .unwrap();
    need.actions()
        .merge(&article("a", "Final cut", "rust"))
        .unwrap();

    assert_eq!(need.actions().size().unwrap(), 1);
    assert!(titles(&need, TEXT, "draft").is_empty());
    assert_eq!(titles(&need, TEXT, "final"), ["Final cut"]);
}

#[test]
fn delete_when_removes_every_match() {
    let tmp = tempfile::tempdir().unwrap();
    let need = Need::resolve(&article_definition(), &settings(&tmp)).unwrap();
    need.actions()
        .bulk_add(&[
            article("a", "One", "rust"),
            article("b", "Two", "rust"),
            article("c", "Three", "go"),
        ])
        .unwrap();

    need.actions().delete_when("section", "rust").unwrap();

    assert_eq!(need.actions().size().unwrap(), 1);
    assert_eq!(titles(&need, TEXT, "three"), ["Three"]);
}

#[test]
fn delete_without_a_model_has_no_primary_key() {
    let tmp = tempfile::tempdir().unwrap();
    let need = Need::resolve(&article_definition(), &settings(&tmp)).unwrap();

    let err = need.actions().delete("a").unwrap_err();
    assert!(matches!(
        err,
        Error::NoPrimaryKey(ref name) if name == "news_ArticleNeed"
    ));
}

#[test]
fn delete_when_on_unknown_field_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let need = Need::resolve(&article_definition(), &settings(&tmp)).unwrap();

    let err = need.actions().delete_when("author", "x").unwrap_err();
    assert!(matches!(
        err,
        Error::UnknownField { ref field, .. } if field == "author"
    ));
}

#[test]
fn clear_and_optimize() {
    let tmp = tempfile::tempdir().unwrap();
    let need = Need::resolve(&article_definition(), &settings(&tmp)).unwrap();
    for i in 0..3 {
        need.actions()
            .add(&article(&format!("s{i}"), "Tale", "misc"))
            .unwrap();
    }

    need.actions().optimize().unwrap();
    assert_eq!(need.actions().size().unwrap(), 3);

    need.actions().clear().unwrap();
    assert_eq!(need.actions().size().unwrap(), 0);
}

#[test]
fn model_records_load_and_delete_by_key() {
    let tmp = tempfile::tempdir().unwrap();
    let def =
        IndexDefinition::new("paper.need", Declaration::new("PaperNeed"))
            .app_label("paper")
            .fields(["title", "doi"])
            .model(paper_model());
    let need = Need::resolve(&def, &settings(&tmp)).unwrap();

    let records =
        [paper("1", "Ownership types"), paper("2", "Region inference")];
    assert_eq!(need.actions().load(&records).unwrap(), 2);
    assert_eq!(need.actions().size().unwrap(), 2);

    let ids = need
        .actions()
        .read(&["title"], "ownership", |hits| {
            hits.iter()
                .map(|hit| hit.unwrap().get("id").unwrap().to_string())
                .collect::<Vec<_>>()
        })
        .unwrap();
    assert_eq!(ids, ["1"]);

    need.actions().delete("1").unwrap();
    assert_eq!(need.actions().size().unwrap(), 1);
    let found = need
        .actions()
        .read(&["title"], "ownership", |hits| hits.len())
        .unwrap();
    assert_eq!(found, 0);
}

#[test]
fn document_pulls_only_schema_fields_from_a_record() {
    let tmp = tempfile::tempdir().unwrap();
    let def =
        IndexDefinition::new("paper.need", Declaration::new("PaperNeed"))
            .app_label("paper")
            .fields(["title"])
            .model(paper_model());
    let need = Need::resolve(&def, &settings(&tmp)).unwrap();

    let doc = need.document(&paper("7", "Linear logic"));
    assert_eq!(doc.get("id"), Some("7"));
    assert_eq!(doc.get("title"), Some("Linear logic"));
    assert_eq!(doc.get("doi"), None);
    assert_eq!(doc.get("notes"), None);
}

#[test]
fn string_field_list_fails_at_resolve() {
    let tmp = tempfile::tempdir().unwrap();
    let def = article_definition()
        .field_list(Some(FieldList::One("title".to_string())));

    let err = Need::resolve(&def, &settings(&tmp)).unwrap_err();
    assert!(matches!(err, Error::FieldsIsString { .. }));
    assert!(!tmp.path().join("news_ArticleNeed").exists());
}

#[test]
fn blocking_managers_share_one_registry_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(&tmp);
    let registry = IndexRegistry::new();

    let writer =
        Need::resolve_blocking(&article_definition(), &settings, &registry)
            .unwrap();
    let reader =
        Need::resolve_blocking(&article_definition(), &settings, &registry)
            .unwrap();
    assert_eq!(registry.len(), 1);

    writer
        .actions()
        .add(&article("a", "Borrow checker tales", "rust"))
        .unwrap();
    assert_eq!(reader.actions().size().unwrap(), 1);
    assert_eq!(titles(&reader, TEXT, "borrow"), ["Borrow checker tales"]);
}

#[test]
fn blocking_manager_serializes_concurrent_writers() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(&tmp);
    let registry = IndexRegistry::new();
    let need =
        Need::resolve_blocking(&article_definition(), &settings, &registry)
            .unwrap();

    const THREADS: usize = 4;
    const PER_THREAD: usize = 5;
    std::thread::scope(|scope| {
        for t in 0..THREADS {
            let need = &need;
            scope.spawn(move || {
                for i in 0..PER_THREAD {
                    need.actions()
                        .add(&article(&format!("t{t}-{i}"), "Tale", "misc"))
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(
        need.actions().size().unwrap(),
        (THREADS * PER_THREAD) as u64
    );
}

#[test]
fn config_file_drives_resolution() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("need.json");
    std::fs::write(
        &path,
        r#"{
          "indexes": [
            {
              "name": "Base",
              "module": "news.need",
              "abstract": true,
              "declared": {
                "title": { "type": "text", "stored": true },
                "draft": { "type": "boolean" }
              }
            },
            {
              "name": "ArticleNeed",
              "module": "news.need",
              "extends": ["Base"],
              "app_label": "news",
              "fields": ["slug", "title"],
              "declared": {
                "slug": { "type": "id", "unique": true, "stored": true },
                "draft": null
              },
              "manager": "blocking"
            }
          ]
        }"#,
    )
    .unwrap();

    let config = NeedConfig::load(&path).unwrap();
    assert!(matches!(
        config.definition("Base"),
        Err(Error::NotFound { .. })
    ));

    let (def, kind) = config.definition("ArticleNeed").unwrap();
    assert_eq!(kind, ManagerKind::Blocking);

    let registry = IndexRegistry::new();
    let need =
        Need::resolve_blocking(&def, &settings(&tmp), &registry).unwrap();
    assert_eq!(need.options().qualified_name(), "news.need.ArticleNeed");
    assert!(!need.options().declared_fields.contains_key("draft"));

    need.actions()
        .merge(&Document::new().with("slug", "a").with("title", "Hello"))
        .unwrap();
    assert_eq!(titles(&need, &["title"], "hello"), ["Hello"]);
}

#[test]
fn read_with_zero_limit_is_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let need = Need::resolve(&article_definition(), &settings(&tmp)).unwrap();
    need.actions()
        .add(&article("a", "Hello there", "misc"))
        .unwrap();

    let count = need
        .actions()
        .read_limited(&["title"], "hello", 0, |hits| hits.len())
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn blocking_managers_on_one_index_must_agree_on_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(&tmp);
    let registry = IndexRegistry::new();
    let narrow = IndexDefinition::new(
        "shared.need",
        Declaration::new("Narrow").field("t", FieldDecl::text().stored()),
    )
    .index("shared")
    .fields(["t"]);
    let wide = IndexDefinition::new(
        "shared.need",
        Declaration::new("Wide")
            .field("t", FieldDecl::text().stored())
            .field("n", FieldDecl::integer()),
    )
    .index("shared")
    .fields(["t", "n"]);

    Need::resolve_blocking(&narrow, &settings, &registry).unwrap();
    let err = Need::resolve_blocking(&wide, &settings, &registry).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(registry.len(), 1);
}
