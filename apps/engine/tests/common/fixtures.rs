//! Test fixtures and factory functions.

use quiz_core::{DuplicateKey, QuestionType};
use quizdeck_engine::{Collection, InMemoryCollection, NewNote, NoteField, NoteId};

/// Quiz text with `count` single-choice questions under one deck.
pub fn sample_quiz(count: usize) -> String {
    let mut text = String::from("// Biology::01-Cells\n");
    for i in 1..=count {
        text.push_str(&format!(
            "Q{i}: Question number {i}?\nA. yes\nB. no\nAnswer: A\nTags: bio\n\n"
        ));
    }
    text
}

/// A note with a `Front` and `Back` field carrying `tags`.
pub fn vocab_note(front: &str, tags: &[&str]) -> NewNote {
    NewNote {
        fingerprint: DuplicateKey::compute(front, QuestionType::FreeResponse),
        note_type: "free_response".to_string(),
        deck: "Vocabulary".to_string(),
        fields: vec![NoteField::new("Front", front), NoteField::new("Back", "")],
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

/// Collection holding one `english` vocab note per word, in order.
pub fn vocab_collection(words: &[&str]) -> (InMemoryCollection, Vec<NoteId>) {
    let mut collection = InMemoryCollection::new();
    let ids = words
        .iter()
        .map(|w| collection.create_note(vocab_note(w, &["english"])).unwrap())
        .collect();
    (collection, ids)
}

/// A note with `Front`, `Back` and an empty `Audio` field.
pub fn audio_note(front: &str, back: &str, tags: &[&str]) -> NewNote {
    NewNote {
        fields: vec![
            NoteField::new("Front", front),
            NoteField::new("Back", back),
            NoteField::new("Audio", ""),
        ],
        ..vocab_note(front, tags)
    }
}
