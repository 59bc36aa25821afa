use bhmm::{Corpus, Error, InferenceState, Model, ModelConfig, Trainer, Variant};

fn corpus() -> Corpus {
    let mut builder = Corpus::builder();
    for _ in 0..3 {
        builder.push_sentence(&["the", "old", "man", "sat"]).unwrap();
        builder.push_sentence(&["a", "young", "girl", "ran"]).unwrap();
        builder.end_document();
    }
    builder.build().unwrap()
}

fn config(variant: Variant) -> ModelConfig {
    ModelConfig::new(variant)
        .with_states(2, 2)
        .unwrap()
        .with_topics(3)
        .unwrap()
        .with_iterations(3)
        .unwrap()
        .with_seed(99)
}

#[test]
fn test_save_load_roundtrip() {
    for variant in [Variant::BHMM, Variant::LDAHMM_DOCUMENT, Variant::HDPHMM] {
        let state = Trainer::new(config(variant)).unwrap().train(&corpus()).unwrap();
        let model = state.export();

        // Use NamedTempFile for automatic cleanup on panic
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        model.save(temp_file.path()).unwrap();
        let loaded = Model::load(temp_file.path()).unwrap();
        assert_eq!(loaded, model);

        let restored = InferenceState::import(&loaded).unwrap();
        assert_eq!(restored.states(), state.states());
        assert_eq!(restored.stats().diff(state.stats()), None);
        assert_eq!(restored.sweeps(), 3);
    }
}

#[test]
fn test_import_detects_mismatch() {
    let state = Trainer::new(config(Variant::BHMM)).unwrap().train(&corpus()).unwrap();
    let model = state.export();

    // move the first word to another valid state without updating the tables
    let mut json = serde_json::to_value(&model).unwrap();
    let old = json["states"][0].as_u64().unwrap();
    json["states"][0] = serde_json::json!(old % 4 + 1);
    let tampered: Model = serde_json::from_value(json).unwrap();

    match InferenceState::import(&tampered) {
        Err(Error::Inconsistent(msg)) => assert!(msg.contains("does not match")),
        other => panic!("expected an inconsistent snapshot, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Model::load(dir.path().join("missing.json.gz")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_resume_continues_training() {
    let trainer = Trainer::new(config(Variant::CDHMM_DOCUMENT)).unwrap();
    let state = trainer.train(&corpus()).unwrap();
    let model = state.export();

    let resumed = trainer.resume(&model).unwrap();
    assert_eq!(resumed.sweeps(), 6);
    let (rebuilt, _) = resumed.recount().unwrap();
    assert_eq!(resumed.stats().diff(&rebuilt), None);

    // resuming the same snapshot twice gives the same result
    let again = trainer.resume(&model).unwrap();
    assert_eq!(again.states(), resumed.states());
}
