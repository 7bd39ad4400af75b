use kiln_config::{ChainStep, TransformId};

use super::{SourceModule, TransformContext, Transformer};
use crate::error::TransformError;
use crate::graph::ModuleKind;

/// Substitutes configured defines. Syntax is passed through unchanged.
pub struct ScriptTransformer;

impl Transformer for ScriptTransformer {
    fn id(&self) -> TransformId {
        TransformId::Script
    }

    fn apply(
        &self,
        module: &mut SourceModule,
        _step: &ChainStep<'_>,
        cx: &TransformContext<'_>,
    ) -> Result<(), TransformError> {
        module.code = cx.defines.apply(&module.code);
        module.kind = ModuleKind::Script;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::transform::tests::{descriptor, run};
    use kiln_config::BuildMode;

    #[test]
    fn mode_is_defined() {
        let descriptor = descriptor(BuildMode::Production);
        let module = run(
            &descriptor,
            "/app/src/main.js",
            b"if (process.env.NODE_ENV === 'production') {}\n",
        )
        .unwrap();
        assert!(module.code.starts_with("if (\"production\" === "));
    }
}
