//! Script minification.
//!
//! Every script module is parsed, compressed and mangled, then printed back
//! without comments or whitespace. Import and export names survive mangling,
//! so lowering still links modules by them.

use kiln_config::stage::MinifyOptions;
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{CompressOptions, MangleOptions, Minifier, MinifierOptions};
use rayon::prelude::*;

use super::{BuildState, StageResult};
use crate::graph::{Module, ModuleKind};
use crate::syntax::{self, SyntaxError};

pub(super) fn run(state: &mut BuildState, opts: &MinifyOptions) -> StageResult {
    let minify = |module: &mut Module| -> StageResult {
        if module.kind == ModuleKind::Style || module.code.is_empty() {
            return Ok(());
        }
        let minified = minify_script(&module.code)
            .map_err(|e| e.in_module(&module.public_id).to_string())?;
        module.code = minified;
        Ok(())
    };
    let modules = state.graph.modules_slice_mut();
    if opts.parallel {
        modules.par_iter_mut().try_for_each(minify)
    } else {
        modules.iter_mut().try_for_each(minify)
    }
}

/// Minify one script.
///
/// # Errors
///
/// `SyntaxError` when `source` does not parse.
pub fn minify_script(source: &str) -> Result<String, SyntaxError> {
    let allocator = Allocator::default();
    let mut program = syntax::parse(&allocator, source)?;
    let minified = Minifier::new(MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::default()),
    })
    .minify(&allocator, &mut program);

    Ok(Codegen::new()
        .with_options(CodegenOptions::minify())
        .with_scoping(minified.scoping)
        .build(&program)
        .code)
}
