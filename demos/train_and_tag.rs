use bhmm::{accuracy, Corpus, Model, ModelConfig, TagMap, Trainer, Variant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("Bicameral HMM Training and Tagging Example");
    println!("==========================================\n");

    // Create training data
    let sentences: [(&[&str], &[&str]); 4] = [
        (&["the", "dog", "barks"], &["DT", "NN", "VB"]),
        (&["a", "cat", "sleeps", "quietly"], &["DT", "NN", "VB", "RB"]),
        (&["the", "bird", "sings"], &["DT", "NN", "VB"]),
        (&["a", "dog", "runs", "fast"], &["DT", "NN", "VB", "RB"]),
    ];
    let mut builder = Corpus::builder();
    for _ in 0..25 {
        for (words, tags) in &sentences {
            builder.push_tagged_sentence(words, tags)?;
        }
        builder.end_document();
    }
    let corpus = builder.build()?;

    println!("Training data:");
    println!("  Tokens: {}", corpus.len());
    println!("  Sentences: {}", corpus.num_sentences());
    println!("  Vocabulary: {}\n", corpus.vocabulary_size());

    // Configure an annealed bicameral model
    let config = ModelConfig::new(Variant::CDHMM_SENTENCE)
        .with_states(3, 2)?
        .with_schedule(2.0, 0.25, 1.0)?
        .with_iterations(20)?
        .with_sampling(3, 5)?
        .with_seed(7);
    println!("Model: {}", config.variant());
    println!(
        "  Schedule: {} -> {} in steps of {}\n",
        config.schedule().initial(),
        config.schedule().target(),
        config.schedule().decrement()
    );

    // Train
    let trainer = Trainer::new(config)?;
    let state = trainer.train(&corpus)?;
    println!("\nPosterior samples (log-likelihood): {:?}\n", state.samples());

    for s in state.summary(3).states {
        let words: Vec<_> = s.top_words.iter().map(|w| w.word.as_str()).collect();
        let class = if s.content { "content" } else { "function" };
        println!("  state {:>2} ({:<8}) {:.3}  {:?}", s.state, class, s.prob, words);
    }

    let map = TagMap::from_corpus(&corpus, |t| t != "DT")?;
    println!(
        "\nAccuracy against gold tags (one-to-one): {:.3}",
        accuracy(state.states(), &corpus, &map)?
    );

    // Save, load and tag
    let model_path = std::env::temp_dir().join("example_model.json.gz");
    state.export().save(&model_path)?;
    println!("\nSaved model to {}", model_path.display());

    let model = Model::load(&model_path)?;
    let tagger = model.tagger()?.with_burn_in(10);

    let mut test = Corpus::builder();
    test.push_sentence(&["the", "cat", "sings"])?;
    test.push_sentence(&["a", "horse", "runs"])?;
    let test = test.build()?;
    let states = tagger.tag(&test)?;

    println!("\nTagging held-out sentences:");
    for (i, &word) in test.words().iter().enumerate() {
        let word = test.lexicon().get(word).unwrap_or("?");
        println!("  {:<8} -> state {}", word, states[i]);
    }

    Ok(())
}
