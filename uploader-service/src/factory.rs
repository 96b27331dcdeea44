//! Builds the orchestrator's collaborators from the loaded settings.

use crate::paper::PaperConnector;
use anyhow::Context;
use pricing::{Clock, NotificationSink};
use std::sync::Arc;
use uploader_core::{
    ingest::{
        DemoInputSource, FeedFormat, FileInputSource, FileSystem, IceDatFormat, LocalFileSystem,
        NymexOptionFormat,
    },
    notify::{CompositeSink, LogSink, NullSink},
    settings::{NotificationSettings, SourceKind, SourceSettings, UploaderSettings},
    shared_source, Destination, SharedSource,
};

pub fn build_sources(
    settings: &UploaderSettings,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Vec<SharedSource>> {
    let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem);
    settings
        .sources
        .iter()
        .map(|source| match source.kind {
            SourceKind::IceDatFile => file_source(IceDatFormat, source, fs.clone()),
            SourceKind::NymexOptionFile => file_source(NymexOptionFormat, source, fs.clone()),
            SourceKind::Demo => {
                log::warn!("Using the demo input source, no files will be read");
                Ok(shared_source(DemoInputSource::new(clock.clone())))
            }
        })
        .collect()
}

fn file_source<F: FeedFormat + 'static>(
    format: F,
    settings: &SourceSettings,
    fs: Arc<dyn FileSystem>,
) -> anyhow::Result<SharedSource> {
    let name = format.source_name();
    let pattern = settings
        .file_pattern
        .clone()
        .unwrap_or_else(|| format.default_pattern().to_string());
    let source = FileInputSource::with_pattern(
        format,
        fs,
        &settings.input_directory,
        &pattern,
        settings.file_read_retry_attempts,
        settings.initial_retry_delay(),
    )
    .with_context(|| format!("Failed to create {} source", name))?;

    log::info!(
        "Watching {} for {} files matching {}",
        settings.input_directory.display(),
        name,
        pattern
    );
    Ok(shared_source(source))
}

pub fn build_destinations(settings: &UploaderSettings) -> anyhow::Result<Vec<Destination>> {
    settings
        .destinations
        .iter()
        .map(|destination| {
            let connector =
                PaperConnector::from_settings(destination.environment, &destination.endpoint)?;
            Ok(Destination::new(destination.clone(), Arc::new(connector)))
        })
        .collect()
}

pub fn build_sink(settings: &NotificationSettings) -> Arc<dyn NotificationSink> {
    let sink: Arc<dyn NotificationSink> = if settings.log {
        Arc::new(LogSink::new(settings.primary_only))
    } else {
        Arc::new(NullSink)
    };
    Arc::new(CompositeSink::new(vec![sink]))
}
