use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use kiln_config::stage::CompressOptions;
use rayon::prelude::*;

use super::{BuildState, StageResult};
use crate::output::ArtifactKind;

/// Write a `.gz` sibling for each matching output that is large enough and
/// actually shrinks.
pub(super) fn run(state: &mut BuildState, opts: &CompressOptions) -> StageResult {
    if opts.algorithm != "gzip" {
        return Err(format!("unsupported compression algorithm '{}'", opts.algorithm));
    }

    let candidates: Vec<(&str, &[u8])> = state
        .outputs
        .iter()
        .filter(|file| file.kind != ArtifactKind::Compressed)
        .filter(|file| file.size() as u64 >= opts.threshold)
        .filter(|file| {
            file.extension()
                .is_some_and(|ext| opts.extensions.iter().any(|e| e.trim_start_matches('.') == ext))
        })
        .map(|file| (file.path.as_str(), file.contents.as_slice()))
        .collect();

    let compressed: Vec<(String, Vec<u8>)> = candidates
        .par_iter()
        .map(|(path, contents)| gzip(contents).map(|gz| (path.to_string(), contents.len(), gz)))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| format!("gzip failed: {e}"))?
        .into_iter()
        .filter(|(path, original, gz)| {
            let ratio = gz.len() as f64 / *original as f64;
            let keep = ratio <= opts.min_ratio;
            if !keep {
                tracing::trace!(path = %path, ratio, "compression skipped, ratio too high");
            }
            keep
        })
        .map(|(path, _, gz)| (format!("{path}.gz"), gz))
        .collect();

    tracing::debug!(files = compressed.len(), "outputs compressed");
    for (path, gz) in compressed {
        state.outputs.insert(path, gz, ArtifactKind::Compressed);
    }
    Ok(())
}

fn gzip(contents: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(contents)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ModuleGraph;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn options() -> CompressOptions {
        CompressOptions {
            algorithm: "gzip".into(),
            extensions: vec!["js".into(), "css".into()],
            threshold: 10240,
            min_ratio: 0.8,
        }
    }

    #[test]
    fn large_compressible_outputs_get_gz_siblings() {
        let mut state = BuildState::new(ModuleGraph::new());
        let big = "console.log('hello');\n".repeat(1000);
        state.outputs.insert("js/app.js", big.clone(), ArtifactKind::Script);
        state.outputs.insert("js/small.js", "x", ArtifactKind::Script);
        state.outputs.insert("index.html", big.clone(), ArtifactKind::Document);
        run(&mut state, &options()).unwrap();

        let gz = state.outputs.get("js/app.js.gz").unwrap();
        assert_eq!(gz.kind, ArtifactKind::Compressed);
        let mut decoded = String::new();
        GzDecoder::new(gz.contents.as_slice())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, big);
        assert!(!state.outputs.contains("js/small.js.gz"));
        assert!(!state.outputs.contains("index.html.gz"));
    }

    #[test]
    fn incompressible_outputs_are_left_alone() {
        let mut state = BuildState::new(ModuleGraph::new());
        // xorshift noise does not shrink.
        let mut x: u32 = 0x9e37_79b9;
        let noise: Vec<u8> = (0..20_000)
            .map(|_| {
                x ^= x << 13;
                x ^= x >> 17;
                x ^= x << 5;
                (x & 0xff) as u8
            })
            .collect();
        state.outputs.insert("js/noise.js", noise, ArtifactKind::Script);
        run(&mut state, &options()).unwrap();
        assert!(!state.outputs.contains("js/noise.js.gz"));
    }

    #[test]
    fn unknown_algorithm_fails() {
        let mut state = BuildState::new(ModuleGraph::new());
        let mut opts = options();
        opts.algorithm = "brotli".into();
        assert!(run(&mut state, &opts).is_err());
    }
}
