//! SSM command document run by the pipeline's send-command

use super::Stack;
use crate::document::{CommandDocument, DocumentSource};
use crate::error::SynthResult;
use crate::template::{Output, Resource, intrinsics, logical_id};
use repave_common::{RepaveConfig, ResourceKind};
use tracing::info;

const DOCUMENT: &str = "MyCfnDocument";
const DOCUMENT_TYPE: &str = "Command";

pub struct CommandDocumentStack;

impl CommandDocumentStack {
    /// Register the document read from `source` under the configured name
    pub fn build(config: &RepaveConfig, source: &dyn DocumentSource) -> SynthResult<Stack> {
        let document = CommandDocument::load(source)?;
        let name = config.document.name.as_str();

        let mut stack = Stack::new(
            &config.stacks.document,
            "Command document installing the CloudWatch agent configuration",
        );

        let id = logical_id(&[DOCUMENT]);
        stack.add(
            &id,
            Resource::new(ResourceKind::SsmDocument)
                .property("Content", document.content().clone())
                .property("DocumentType", DOCUMENT_TYPE)
                .property("Name", name),
        )?;
        stack.add_output(
            "DocumentName",
            Output {
                description: Some("Name the pipeline sends the command by".to_string()),
                value: intrinsics::reference(&id),
                export: None,
            },
        );

        info!(
            stack = %stack.name(),
            document = %name,
            schema_version = %document.schema_version(),
            steps = ?document.step_names(),
            "Built command document"
        );
        Ok(stack)
    }
}
