use kiln_config::{AssetDecision, ChainStep, TransformId};

use super::{SourceModule, TransformContext, Transformer};
use crate::error::TransformError;
use crate::graph::{EmittedFile, ModuleKind};

/// Inlines small binary assets as data URIs and emits the rest as hashed
/// files, per the matching category rule.
pub struct UrlTransformer;

impl Transformer for UrlTransformer {
    fn id(&self) -> TransformId {
        TransformId::Url
    }

    fn apply(
        &self,
        module: &mut SourceModule,
        step: &ChainStep<'_>,
        cx: &TransformContext<'_>,
    ) -> Result<(), TransformError> {
        let rule = cx.chain.asset.ok_or_else(|| {
            TransformError::new(step.transform, "rule has no asset category")
        })?;

        let url = match rule.decide(&module.bytes, &module.path) {
            AssetDecision::Inline { data_uri } => data_uri,
            AssetDecision::Emit { file_name, .. } => {
                let url = cx.descriptor.public_url(&file_name);
                module.emitted = Some(EmittedFile {
                    file_name,
                    contents: module.bytes.clone(),
                });
                url
            }
        };
        module.export_url(url);
        module.kind = ModuleKind::Asset;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::transform::tests::{descriptor, run};
    use kiln_config::BuildMode;

    #[test]
    fn small_images_inline() {
        let descriptor = descriptor(BuildMode::Production);
        let module = run(&descriptor, "/app/src/logo.png", &[1u8; 100]).unwrap();
        assert!(module.emitted.is_none());
        assert!(module
            .asset_url
            .as_deref()
            .unwrap()
            .starts_with("data:image/png;base64,"));
        assert!(module.code.starts_with("export default \"data:image/png"));
    }

    #[test]
    fn large_images_emit_under_public_path() {
        let descriptor = descriptor(BuildMode::Production);
        let module = run(&descriptor, "/app/src/logo.png", &vec![1u8; 20_000]).unwrap();
        let emitted = module.emitted.unwrap();
        assert!(emitted.file_name.starts_with("static/img/logo."));
        assert_eq!(
            module.asset_url.unwrap(),
            format!("/{}", emitted.file_name)
        );
    }
}
