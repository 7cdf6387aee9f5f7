//! Parse, import and journal tests.

mod common;

use pretty_assertions::assert_eq;
use quiz_core::{parse, DuplicateKey, QuestionType};
use quizdeck_engine::journal::SessionAction;
use quizdeck_engine::{
    import_segments, Collection, CollectionError, Config, ImportConfig, ImportOutcome,
    InMemoryCollection, SessionStore, SkipReason,
};

use common::fixtures::sample_quiz;

#[test]
fn reimporting_the_same_text_creates_nothing() {
    common::init();
    let (deck, diagnostics) = parse(&sample_quiz(3));
    assert!(diagnostics.is_empty());
    let mut collection = InMemoryCollection::new();
    let config = ImportConfig::default();

    let first = import_segments(&deck, &mut collection, &config);
    let second = import_segments(&deck, &mut collection, &config);

    assert_eq!(first.created, 3);
    assert!(first.errors.is_empty());
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped.len(), 3);
    assert_eq!(collection.len(), 3);
}

#[test]
fn imported_notes_carry_deck_fields_and_tags() {
    let (deck, _) = parse(&sample_quiz(1));
    let mut collection = InMemoryCollection::new();

    let result = import_segments(&deck, &mut collection, &ImportConfig::default());
    let note = collection.get(result.created_note_ids()[0]).unwrap();

    assert_eq!(note.deck, "Biology::01-Cells");
    assert_eq!(note.note_type, "single_choice");
    assert_eq!(note.field("Front"), Some("Question number 1?"));
    assert_eq!(note.field("Options"), Some("A. yes\nB. no"));
    assert_eq!(note.field("Back"), Some("A"));
    assert_eq!(
        note.tags,
        vec![
            "bio".to_string(),
            "Cells".to_string(),
            "type::single_choice".to_string()
        ]
    );
}

#[test]
fn near_identical_questions_in_one_paste_become_one_note() {
    let text = "Q1: What is   Rust?\nAnswer: A language\nQ2: what is rust?\nAnswer: A language";
    let (deck, _) = parse(text);
    let mut collection = InMemoryCollection::new();

    let result = import_segments(&deck, &mut collection, &ImportConfig::default());

    assert_eq!(result.created, 1);
    assert_eq!(
        result.skipped,
        vec![DuplicateKey::compute("what is rust?", QuestionType::SingleChoice)]
    );
    assert_eq!(
        result.items[1].outcome,
        ImportOutcome::Skipped {
            reason: SkipReason::InBatch
        }
    );
}

#[test]
fn rejected_notes_do_not_stop_the_batch() {
    let text = "Q1: First?\nAnswer: A\nfill: Second ____\nAnswer: x\nQ3: Third?\nAnswer: B";
    let (deck, _) = parse(text);
    let mut collection =
        InMemoryCollection::new().with_note_type("fill_blank", ["Front", "Back"]);

    let result = import_segments(&deck, &mut collection, &ImportConfig::default());

    assert_eq!(result.created, 2);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].line, 3);
    assert!(matches!(
        result.errors[0].error,
        CollectionError::InvalidField { ref field, .. } if field == "Options"
    ));
    assert_eq!(result.items[1].outcome, ImportOutcome::Failed);

    // The failed segment is retried on the next import and fails the same way.
    let again = import_segments(&deck, &mut collection, &ImportConfig::default());
    assert_eq!(again.created, 0);
    assert_eq!(again.errors.len(), 1);
}

#[test]
fn config_json_drives_tags_and_note_types() {
    let config = Config::from_json_str(
        r#"{
            "import": {
                "base_tags": ["exam2024"],
                "chapter_depth": 2,
                "type_tag_prefix": "kind/",
                "note_types": {"fill_blank": "Cloze"}
            }
        }"#,
    )
    .unwrap();
    let text = "// Science::02-Biology::03_Cells\nfill: The ____ is the powerhouse of the cell.\nAnswer: mitochondrion";
    let (deck, _) = parse(text);
    let mut collection = InMemoryCollection::new();

    let result = import_segments(&deck, &mut collection, &config.import);
    let note = collection.get(result.created_note_ids()[0]).unwrap();

    assert_eq!(note.note_type, "Cloze");
    assert_eq!(
        note.tags,
        vec![
            "exam2024".to_string(),
            "Biology::Cells".to_string(),
            "kind/fill_blank".to_string()
        ]
    );
}

#[test]
fn journal_rollback_removes_only_that_session() -> anyhow::Result<()> {
    let store = SessionStore::open_in_memory()?;
    let mut collection = InMemoryCollection::new();
    let config = ImportConfig::default();

    let (first_deck, _) = parse(&sample_quiz(2));
    let first = import_segments(&first_deck, &mut collection, &config);
    store.record("week1.txt", &first)?;

    let (second_deck, _) = parse("Q1: Brand new?\nAnswer: yes\nQ2: Question number 1?\nA. yes\nB. no\nAnswer: A");
    let second = import_segments(&second_deck, &mut collection, &config);
    let session = store.record("week2.txt", &second)?;
    assert_eq!(session.created, 1);
    assert_eq!(session.skipped, 1);
    assert_eq!(session.items[1].action, SessionAction::Skipped);
    assert_eq!(collection.len(), 3);

    let latest = store.latest()?.expect("a session was recorded");
    assert_eq!(latest.id, session.id);

    let rollback = store.rollback(&session.id, &mut collection)?;
    assert_eq!(rollback.deleted, second.created_note_ids());
    assert_eq!(collection.len(), 2);
    assert!(collection.list_notes_by_tag("")?.iter().all(|n| n
        .field("Front")
        .unwrap()
        .starts_with("Question number")));

    // Rolled-back questions import again.
    let third = import_segments(&second_deck, &mut collection, &config);
    assert_eq!(third.created, 1);
    Ok(())
}

#[test]
fn journal_on_disk_respects_keep_limit() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = Config::from_json_str(&format!(
        r#"{{"journal": {{"keep_limit": 2, "path": {:?}}}}}"#,
        dir.path().join("journal.db")
    ))?;
    let store = SessionStore::from_config(&config.journal)?;
    let mut collection = InMemoryCollection::new();

    for i in 1..=3 {
        let (deck, _) = parse(&format!("Q: Question {i}?\nAnswer: A"));
        let result = import_segments(&deck, &mut collection, &config.import);
        store.record(&format!("file{i}.txt"), &result)?;
    }

    let sources: Vec<String> = store.list()?.into_iter().map(|s| s.source).collect();
    assert_eq!(sources, vec!["file3.txt".to_string(), "file2.txt".to_string()]);
    Ok(())
}
