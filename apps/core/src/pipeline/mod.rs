//! # Pipeline Module
//!
//! The two-sided response pipeline: the `Preprocessor` turns an inbound
//! message plus ambient context into a generation request; after the
//! external generation step the `Postprocessor` validates and stylizes the
//! raw candidate into the final deliverable. `ResponsePipeline` composes
//! both around an injected generation service.

pub mod postprocessor;
pub mod preprocessor;

pub use postprocessor::{Postprocessor, ResponseState, StateEvent};
pub use preprocessor::{Preprocessor, ProcessOptions};

use std::sync::Arc;
use tracing::{instrument, warn};

use crate::error::PipelineError;
use crate::models::{InboundMessage, PostprocessResult};
use crate::traits::GenerationService;

/// End-to-end composition: pre → generate → post.
pub struct ResponsePipeline {
    preprocessor: Preprocessor,
    generator: Arc<dyn GenerationService>,
    postprocessor: Postprocessor,
}

impl ResponsePipeline {
    pub fn new(
        preprocessor: Preprocessor,
        generator: Arc<dyn GenerationService>,
        postprocessor: Postprocessor,
    ) -> Self {
        Self {
            preprocessor,
            generator,
            postprocessor,
        }
    }

    /// Handles one message end to end. Preprocessing failures propagate
    /// (the request would be meaningless without a prompt); generation
    /// failures route into the fallback cascade instead.
    #[instrument(skip(self, message, options), fields(message_id = %message.id))]
    pub async fn respond(
        &self,
        message: &InboundMessage,
        options: &ProcessOptions,
    ) -> Result<PostprocessResult, PipelineError> {
        let request = self.preprocessor.process(message, options).await?;

        let raw = match self.generator.generate(&request).await {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!("generation failed: {e}");
                None
            }
        };

        Ok(self.postprocessor.process(raw, &request).await)
    }
}
