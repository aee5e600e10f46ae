//! RrdtoolStore - round-robin archives through the `rrdtool` executable
//!
//! One `<dir>/<group>.rrd` per channel group. Data sources are gauges with a
//! heartbeat of two steps; text values are written as unknown (`U`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use contracts::{ds_name, ContractError, RoundRobinLayout, RoundRobinStore, Scalar};
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Round-robin store backed by rrdtool files
pub struct RrdtoolStore {
    program: String,
    dir: PathBuf,
    files: HashMap<String, PathBuf>,
}

impl RrdtoolStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_program("rrdtool", dir)
    }

    /// Use a different executable (e.g. an absolute path)
    pub fn with_program(program: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            dir: dir.into(),
            files: HashMap::new(),
        }
    }

    /// Archive file of `group`
    pub fn file_for(&self, group: &str) -> PathBuf {
        self.dir.join(format!("{group}.rrd"))
    }

    async fn run(&self, group: &str, args: &[String]) -> Result<(), ContractError> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| ContractError::update(group, format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ContractError::update(
                group,
                format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            ));
        }
        Ok(())
    }
}

/// Arguments of `rrdtool create`
pub fn create_args(file: &Path, layout: &RoundRobinLayout) -> Vec<String> {
    let step = layout.step_secs.max(1);
    let heartbeat = step * 2;

    let mut args = vec![
        "create".to_string(),
        file.display().to_string(),
        "--step".to_string(),
        step.to_string(),
        "--no-overwrite".to_string(),
    ];
    args.extend(
        layout
            .items
            .iter()
            .map(|item| format!("DS:{}:GAUGE:{heartbeat}:U:U", ds_name(item))),
    );
    args.extend(
        layout
            .archives
            .iter()
            .map(|a| format!("RRA:AVERAGE:0.5:{}:{}", a.steps, a.rows)),
    );
    args
}

/// Arguments of `rrdtool update`
pub fn update_args(file: &Path, values: &[Scalar], timestamp: i64) -> Vec<String> {
    let mut sample = timestamp.to_string();
    for value in values {
        sample.push(':');
        match value.as_f64() {
            Some(v) if v.is_finite() => sample.push_str(&value.to_string()),
            _ => sample.push('U'),
        }
    }
    vec!["update".to_string(), file.display().to_string(), sample]
}

impl RoundRobinStore for RrdtoolStore {
    fn name(&self) -> &str {
        "rrdtool"
    }

    #[instrument(name = "rrdtool_create", skip(self, layout), fields(group = %layout.group))]
    async fn create_if_absent(&mut self, layout: &RoundRobinLayout) -> Result<(), ContractError> {
        let file = self.file_for(&layout.group);
        self.files.insert(layout.group.clone(), file.clone());

        if tokio::fs::try_exists(&file).await.unwrap_or(false) {
            debug!(file = %file.display(), "Archive exists");
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        self.run(&layout.group, &create_args(&file, layout)).await?;
        info!(file = %file.display(), items = layout.items.len(), "Archive created");
        Ok(())
    }

    async fn update(
        &mut self,
        group: &str,
        values: &[Scalar],
        timestamp: i64,
    ) -> Result<(), ContractError> {
        let file = self
            .files
            .get(group)
            .ok_or_else(|| ContractError::update(group, "archive not created"))?;
        let args = update_args(file, values, timestamp);
        self.run(group, &args).await
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        // every call is a separate process; nothing stays open
        self.files.clear();
        Ok(())
    }
}
