//! Training Session Example
//!
//! Drives one full tracking session end to end: project creation, an
//! experiment run with parameters, metric series and file uploads, then
//! model-registry logging with a stage transition.
//!
//! Run with: cargo run --example training_session

use std::sync::Arc;

use anyhow::Result;
use trueno_track::{
    ApiToken, ExperimentRun, MemoryBackend, ModelStorage, Project, RunMode, Stage,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== Trueno-Track Training Session ===\n");

    let backend = Arc::new(MemoryBackend::new());
    let token = ApiToken::from_env().unwrap_or_else(|_| ApiToken::new("demo-token"));

    // -------------------------------------------------------------------------
    // 1. Create the project
    // -------------------------------------------------------------------------
    println!("1. Creating project...");

    let project = Project::new(backend, token, "acme", "churn-model", "CHURN");
    project.create().await?;
    println!("   Project: {}", project.full_name());
    println!("   Key: {}", project.key());

    // -------------------------------------------------------------------------
    // 2. Open an experiment run
    // -------------------------------------------------------------------------
    println!("\n2. Opening experiment run...");

    let run = ExperimentRun::open(&project, RunMode::Async).await?;
    println!("   Run ID: {}", run.run_info().run_id());
    println!("   URL: {}", run.run_info().run_url());

    // -------------------------------------------------------------------------
    // 3. Log tags, parameters, and a training curve
    // -------------------------------------------------------------------------
    println!("\n3. Logging training session...");

    run.add_tags(["experiment1", "lightgbm"]).await?;
    run.log_value(
        "parameters",
        serde_json::json!({"learning_rate": 0.001, "optimizer": "adam"}),
    )
    .await?;

    for epoch in 0..100 {
        run.log_series("train", "loss", 0.1_f64.powi(epoch)).await?;
    }
    println!("   Logged 100 loss points");

    run.upload("files", ["Cargo.toml", "README.md"]).await?;
    println!("   Uploaded 2 files");

    // -------------------------------------------------------------------------
    // 4. Open model storage linked to the run, then stop the run
    // -------------------------------------------------------------------------
    println!("\n4. Opening model storage...");

    let mut storage = ModelStorage::open(&project, Some(&run), "mdl", None).await?;
    run.stop().await?;
    println!("   Container: {}", storage.container_id());
    println!("   Version: {}", storage.version_id());

    // -------------------------------------------------------------------------
    // 5. Log registry metadata and provenance
    // -------------------------------------------------------------------------
    println!("\n5. Logging model metadata...");

    storage.add_container_tags(["models-tag1", "models-tag2"]).await?;
    storage.add_version_tags(["model-tag1"]).await?;
    storage
        .log_container_value("env", serde_json::json!({"model": "lightgbm"}))
        .await?;
    storage
        .log_version_value("params", serde_json::json!({"n_trees": 12, "frac": 0.5}))
        .await?;
    storage.log_run_info().await?;

    // -------------------------------------------------------------------------
    // 6. Promote to production and query by stage
    // -------------------------------------------------------------------------
    println!("\n6. Promoting model...");

    storage.change_stage("Production".parse::<Stage>()?).await?;
    storage.get_stage_model(Stage::Production).await?;
    println!("   Production model: {}", storage.version_id());

    let rows = storage.get_models().await?;
    println!("   Version table ({} rows):", rows.len());
    for row in &rows {
        println!(
            "     {} stage={} modified={}",
            row.id(),
            row.stage().map_or("none", Stage::as_str),
            row.modification_time()
        );
    }

    // -------------------------------------------------------------------------
    // 7. Close the registry handles
    // -------------------------------------------------------------------------
    println!("\n7. Stopping model storage...");
    storage.stop().await?;

    println!("\n=== Training Session Complete ===");
    Ok(())
}
