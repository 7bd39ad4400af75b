//! Development builds into the in-memory cache.

use std::sync::Arc;
use std::time::Instant;

use kiln_config::{mime_type, BuildDescriptor};
use kiln_pipeline::{BuildArtifacts, NativeEngine};

use crate::dev::error_overlay::render_overlay;
use crate::dev::state::BundleCache;

/// Result of one development build.
#[derive(Debug)]
pub enum BuildOutcome {
    Success { duration_ms: u64, cache: BundleCache },
    /// `overlay` is set only when the descriptor enables the error overlay.
    Failed {
        errors: Vec<String>,
        overlay: Option<String>,
    },
}

/// Runs development builds for one descriptor. Cheap to clone.
#[derive(Clone)]
pub struct DevBuilder {
    descriptor: Arc<BuildDescriptor>,
    engine: Arc<NativeEngine>,
}

impl DevBuilder {
    pub fn new(descriptor: BuildDescriptor) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            engine: Arc::new(NativeEngine::new()),
        }
    }

    pub fn descriptor(&self) -> &BuildDescriptor {
        &self.descriptor
    }

    /// Build synchronously. Run it on a blocking thread.
    pub fn build(&self) -> BuildOutcome {
        let started = Instant::now();
        match kiln_pipeline::build(self.engine.as_ref(), &self.descriptor) {
            Ok(artifacts) => BuildOutcome::Success {
                duration_ms: started.elapsed().as_millis() as u64,
                cache: self.cache_from(&artifacts),
            },
            Err(err) => {
                let errors = match err {
                    kiln_pipeline::Error::Diagnostics(diagnostics) => {
                        diagnostics.iter().map(ToString::to_string).collect()
                    }
                    other => vec![other.to_string()],
                };
                let overlay_enabled = self
                    .descriptor
                    .dev_server_options()
                    .is_some_and(|opts| opts.error_overlay);
                BuildOutcome::Failed {
                    overlay: overlay_enabled.then(|| render_overlay(&errors)),
                    errors,
                }
            }
        }
    }

    /// Key every output by the URL it is served at.
    pub fn cache_from(&self, artifacts: &BuildArtifacts) -> BundleCache {
        let mut cache = BundleCache::new();
        for file in artifacts.outputs.iter() {
            let content_type = mime_type(file.extension().unwrap_or_default());
            cache.insert(
                self.descriptor.public_url(&file.path),
                file.contents.clone(),
                content_type.to_string(),
            );
        }
        cache
    }

    /// URL of the entry document.
    pub fn document_url(&self) -> String {
        self.descriptor.public_url(&self.descriptor.html_filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::{describe, BuildMode, ProjectConfig};
    use std::fs;
    use tempfile::TempDir;

    fn project(main: &str) -> (TempDir, DevBuilder) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.js"), main).unwrap();
        let descriptor =
            describe(&ProjectConfig::default(), dir.path(), BuildMode::Development).unwrap();
        (dir, DevBuilder::new(descriptor))
    }

    #[test]
    fn successful_build_is_served_by_url() {
        let (_dir, builder) = project("console.log('hi');\n");
        match builder.build() {
            BuildOutcome::Success { cache, .. } => {
                let (body, content_type) = cache.get("/app.js").unwrap();
                assert!(String::from_utf8_lossy(body).contains("console.log('hi')"));
                assert_eq!(content_type, "application/javascript");
                assert_eq!(cache.get("/index.html").unwrap().1, "text/html; charset=utf-8");
                assert!(cache.get("/runtime.js").is_some());
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn failed_build_carries_overlay() {
        let (_dir, builder) = project("import './missing.js';\n");
        match builder.build() {
            BuildOutcome::Failed { errors, overlay } => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("missing"));
                assert!(overlay.unwrap().contains("Failed to compile"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn document_url_uses_public_path() {
        let (_dir, builder) = project("");
        assert_eq!(builder.document_url(), "/index.html");
    }
}
