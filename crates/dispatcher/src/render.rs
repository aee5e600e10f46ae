//! ScriptRenderer - runs the external plotting program

use contracts::{ContractError, RenderRequest, RenderTrigger};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Render trigger invoking a script with positional arguments
#[derive(Debug, Clone)]
pub struct ScriptRenderer {
    program: String,
}

impl ScriptRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl RenderTrigger for ScriptRenderer {
    #[instrument(name = "script_render", skip(self, request), fields(program = %self.program))]
    async fn render(&mut self, request: &RenderRequest) -> Result<(), ContractError> {
        let args = request.to_args();
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| ContractError::render(&self.program, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ContractError::render(
                &self.program,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        debug!(args = ?args, "Render finished");
        Ok(())
    }
}

/// Renderer used when rendering is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRender;

impl RenderTrigger for NoRender {
    async fn render(&mut self, _request: &RenderRequest) -> Result<(), ContractError> {
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use contracts::RenderTopology;
    use std::path::PathBuf;

    fn request() -> RenderRequest {
        RenderRequest {
            storage_path: PathBuf::from("rrd"),
            output_path: PathBuf::from("html"),
            topology: RenderTopology::default(),
        }
    }

    #[tokio::test]
    async fn test_success_exit() {
        let mut renderer = ScriptRenderer::new("true");
        renderer.render(&request()).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_render_error() {
        let mut renderer = ScriptRenderer::new("false");
        let result = renderer.render(&request()).await;
        assert!(matches!(result, Err(ContractError::Render { .. })));
    }

    #[tokio::test]
    async fn test_missing_program_is_render_error() {
        let mut renderer = ScriptRenderer::new("/nonexistent/draw.sh");
        let result = renderer.render(&request()).await;
        assert!(matches!(result, Err(ContractError::Render { .. })));
    }
}
