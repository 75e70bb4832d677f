//! Scripted conversation against the in-memory backends.
//!
//! Runs the whole pipeline offline with the deterministic hash embedder:
//! an enthusiasm trigger warms the CHRO, the same question asked three
//! times earns a woven nudge, and a persona switch gets its own scoped
//! retrieval.  `RUST_LOG=debug` shows the supervision decisions.
//!
//!     cargo run -p ce-engine --example demo

use std::sync::Arc;

use anyhow::Result;

use ce_domain::config::Config;
use ce_engine::Engine;
use ce_personas::PersonaRegistry;
use ce_retrieval::{HashEmbedder, VectorIndex};
use ce_sessions::MemorySessionStore;

const DIM: usize = 256;

fn corpus() -> Result<(HashEmbedder, VectorIndex)> {
    let embedder = HashEmbedder::new(DIM);
    let index = VectorIndex::new(DIM);

    let docs: [(&str, &str, &[&str], Option<&str>); 3] = [
        (
            "hr_pillars",
            "the competency framework rests on four pillars: vision, \
             entrepreneurship, passion and trust, each with observable \
             behavioral indicators per level",
            &["chro"],
            Some("pillars"),
        ),
        (
            "hr_feedback",
            "360-degree feedback gathers manager, peer and self ratings \
             before any development conversation",
            &["chro"],
            Some("feedback"),
        ),
        (
            "ceo_strategy",
            "talent development is a competitive advantage when it \
             strengthens each brand rather than flattening them",
            &["ceo"],
            None,
        ),
    ];

    for (id, text, personas, marker) in docs {
        index.insert(
            id,
            text,
            embedder.embed_sync(text),
            personas.iter().map(|p| (*p).to_owned()),
            marker.map(str::to_owned),
        )?;
    }
    Ok((embedder, index))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (embedder, index) = corpus()?;
    let engine = Engine::new(
        Config::default(),
        PersonaRegistry::with_builtin(),
        Arc::new(MemorySessionStore::new()),
        Arc::new(embedder),
        Arc::new(index),
    );

    let session = engine.create_session("demo-user").await?;
    let script = [
        ("chro", "Where should we start on the competency framework?"),
        ("chro", "I'd love to fold in job rotations across the brands."),
        ("chro", "How do the four pillars fit together exactly?"),
        ("chro", "How do the four pillars fit together exactly?"),
        ("chro", "How do the four pillars fit together exactly?"),
        ("ceo", "What would make this a competitive advantage for us?"),
    ];

    for (persona, line) in script {
        let outcome = engine
            .run_turn(&session.session_id, persona, line, &[])
            .await?;
        println!("you -> {persona}: {line}");
        println!(
            "{persona} (directive {:?}, score {}): {}\n",
            outcome.directive, outcome.relationship_score, outcome.reply_text
        );
    }

    Ok(())
}
