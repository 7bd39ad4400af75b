use kiln_config::{ChainStep, TransformId};

use super::{SourceModule, TransformContext, Transformer};
use crate::error::TransformError;
use crate::graph::ModuleKind;

/// JSON documents become modules whose default export is the parsed value.
pub struct JsonTransformer;

impl Transformer for JsonTransformer {
    fn id(&self) -> TransformId {
        TransformId::Json
    }

    fn apply(
        &self,
        module: &mut SourceModule,
        step: &ChainStep<'_>,
        _cx: &TransformContext<'_>,
    ) -> Result<(), TransformError> {
        let value: serde_json::Value = serde_json::from_str(&module.code)
            .map_err(|e| TransformError::new(step.transform, format!("invalid JSON: {e}")))?;
        module.code = format!("export default {value};");
        module.kind = ModuleKind::Data;
        Ok(())
    }
}
