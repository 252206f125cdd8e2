use crate::{
    app::{self, NotesApp, PersistMode},
    notes::NoteStore,
    semantic::EmbeddingProvider,
};
use anyhow::Result;

pub struct SearchArgs {
    pub query: String,
    pub folder: Option<String>,
    pub threshold: Option<f32>,
    pub limit: Option<usize>,
    pub no_regenerate: bool,
}

/// Run one search and print the response as JSON.
///
/// Regenerated embeddings are stored before returning, so the next
/// invocation reuses them.
pub async fn handle_search<P: EmbeddingProvider + 'static>(
    args: SearchArgs,
    app: &NotesApp<P>,
) -> Result<()> {
    let options = app.options_with(args.threshold, args.limit, Some(!args.no_regenerate))?;

    let response = app
        .search(&args.query, args.folder.as_deref(), options, PersistMode::Await)
        .await?;

    let stats = &response.stats;
    log::info!(
        "{} results, considered={} regenerated={} reused={} failures={} in {}ms",
        response.results.len(),
        stats.total_notes_considered,
        stats.regenerated_count,
        stats.reused_count,
        stats.regeneration_failures,
        stats.total_duration_ms
    );

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Print the freshness of every note. Makes no network calls.
pub fn handle_status(folder: Option<String>, store: &dyn NoteStore, dimensions: usize) -> Result<()> {
    let reports = app::status(store, folder.as_deref(), dimensions)?;

    let stale = reports.iter().filter(|r| r.needs_regeneration).count();
    log::info!("{} notes, {stale} need regeneration", reports.len());

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
