use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::container::{ContainerRuntime, EngineVersion, RunSpec, RuntimeError};

/// Bound for short metadata commands (ps, images, rm, version)
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// [`ContainerRuntime`] backed by the `docker` command line client
#[derive(Debug, Clone)]
pub struct DockerCli {
    bin: String,
    run_timeout: Duration,
}

impl DockerCli {
    pub fn new(bin: impl Into<String>, run_timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            run_timeout,
        }
    }

    /// Run a docker subcommand, returning stdout on success
    ///
    /// The client process is killed if `limit` elapses first.
    async fn exec(
        &self,
        operation: &'static str,
        args: &[String],
        limit: Option<Duration>,
    ) -> Result<String, RuntimeError> {
        debug!(operation, args = ?args, "executing docker command");

        let mut command = Command::new(&self.bin);
        command.args(args).kill_on_drop(true);

        let output = match limit {
            Some(limit) => timeout(limit, command.output())
                .await
                .map_err(|_| RuntimeError::Timeout {
                    operation,
                    timeout: limit,
                })?,
            None => command.output().await,
        }
        .map_err(|source| RuntimeError::Spawn { operation, source })?;

        check_output(operation, output)
    }
}

/// Turn a finished docker invocation into stdout or a classified error
fn check_output(operation: &'static str, output: Output) -> Result<String, RuntimeError> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if let Some(name) = conflicting_name(&stderr) {
            return Err(RuntimeError::NameConflict(name));
        }
        return Err(RuntimeError::CommandFailed {
            operation,
            code: output.status.code(),
            stderr,
        });
    }

    String::from_utf8(output.stdout).map_err(|e| RuntimeError::UnexpectedOutput {
        operation,
        detail: e.to_string(),
    })
}

/// Extract the container name from a docker name-conflict message
///
/// Docker reports a 409 as `Conflict. The container name "/get-cuda-cores" is already in use ...`
fn conflicting_name(stderr: &str) -> Option<String> {
    if !stderr.contains("Conflict.") && !stderr.contains("is already in use") {
        return None;
    }

    let name = stderr
        .split("container name \"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .map(|name| name.trim_start_matches('/').to_string())
        .unwrap_or_default();
    Some(name)
}

fn non_empty_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Arguments for `docker run`, with the image last
fn run_args(spec: &RunSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--rm".to_string(),
        "--name".to_string(),
        spec.name.clone(),
    ];

    for device in &spec.devices {
        args.push("--device".to_string());
        args.push(device.clone());
    }

    for (host, binding) in &spec.volumes {
        args.push("--volume".to_string());
        args.push(format!("{}:{}:{}", host, binding.bind, binding.mode.as_str()));
    }

    args.push(spec.image.clone());
    args
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn running_images(&self) -> Result<Vec<String>, RuntimeError> {
        let args = ["ps", "--format", "{{.Image}}"].map(String::from);
        let stdout = self.exec("docker ps", &args, Some(COMMAND_TIMEOUT)).await?;
        Ok(non_empty_lines(&stdout))
    }

    async fn list_images(&self, reference: &str) -> Result<Vec<String>, RuntimeError> {
        let args = ["images", "--format", "{{.Repository}}:{{.Tag}}", reference].map(String::from);
        let stdout = self.exec("docker images", &args, Some(COMMAND_TIMEOUT)).await?;

        Ok(non_empty_lines(&stdout)
            .into_iter()
            .filter(|image| !image.ends_with(":<none>"))
            .collect())
    }

    async fn build_image(&self, context: &Path, dockerfile: &str, tag: &str) -> Result<(), RuntimeError> {
        info!(%tag, context = %context.display(), "building image");

        let args = vec![
            "build".to_string(),
            "--tag".to_string(),
            tag.to_string(),
            "--file".to_string(),
            context.join(dockerfile).to_string_lossy().into_owned(),
            context.to_string_lossy().into_owned(),
        ];
        self.exec("docker build", &args, None).await?;
        Ok(())
    }

    async fn run_container(&self, spec: &RunSpec) -> Result<String, RuntimeError> {
        let result = self
            .exec("docker run", &run_args(spec), Some(self.run_timeout))
            .await;

        if let Err(RuntimeError::Timeout { .. }) = &result {
            // Killing the client leaves the container running
            if let Err(e) = self.remove_container(&spec.name).await {
                warn!(error = %e, container = %spec.name, "failed to remove timed out container");
            }
        }

        result
    }

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        let args = ["rm", "--force", name].map(String::from);
        self.exec("docker rm", &args, Some(COMMAND_TIMEOUT)).await?;
        Ok(())
    }

    async fn engine_version(&self) -> Result<EngineVersion, RuntimeError> {
        let args = ["version", "--format", "{{.Server.Version}} {{.Server.APIVersion}}"].map(String::from);
        let stdout = self.exec("docker version", &args, Some(COMMAND_TIMEOUT)).await?;

        let mut parts = stdout.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(engine), Some(api)) => Ok(EngineVersion {
                engine: engine.to_string(),
                api: api.to_string(),
            }),
            _ => Err(RuntimeError::UnexpectedOutput {
                operation: "docker version",
                detail: format!("expected '<engine> <api>', got '{}'", stdout.trim()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ErrorClass;
    use crate::detect::{MountMode, VolumeBinding};
    use std::collections::BTreeMap;

    #[test]
    fn recognizes_name_conflicts() {
        let stderr = "docker: Error response from daemon: Conflict. The container name \"/get-cuda-cores\" \
                      is already in use by container \"3f2a\". You have to remove (or rename) that container \
                      to be able to reuse that name.";
        assert_eq!(conflicting_name(stderr).as_deref(), Some("get-cuda-cores"));
        assert!(conflicting_name("Unable to find image 'probe:0.0.1' locally").is_none());
    }

    #[test]
    fn recognizes_reworded_conflicts() {
        let stderr = "Error response from daemon: Conflict. The container name \"/get-cuda-cores\" \
                      is in use by container \"3f2a\".";
        assert_eq!(conflicting_name(stderr).as_deref(), Some("get-cuda-cores"));
    }

    #[test]
    fn run_args_bind_devices_and_volumes() {
        let spec = RunSpec {
            image: "edgescout/cuda-core-probe:0.0.1".into(),
            name: "get-cuda-cores".into(),
            devices: vec!["/dev/nvidia0:/dev/nvidia0:rwm".into()],
            volumes: BTreeMap::from([(
                "/usr/local/cuda".to_string(),
                VolumeBinding {
                    bind: "/usr/local/cuda".into(),
                    mode: MountMode::ReadOnly,
                },
            )]),
        };

        assert_eq!(
            run_args(&spec),
            vec![
                "run",
                "--rm",
                "--name",
                "get-cuda-cores",
                "--device",
                "/dev/nvidia0:/dev/nvidia0:rwm",
                "--volume",
                "/usr/local/cuda:/usr/local/cuda:ro",
                "edgescout/cuda-core-probe:0.0.1",
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_unexpected() {
        let docker = DockerCli::new("/nonexistent/docker", Duration::from_secs(1));

        let err = docker.running_images().await.unwrap_err();
        assert!(matches!(err, RuntimeError::Spawn { .. }));
        assert_eq!(err.class(), ErrorClass::Unexpected);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_run_is_killed_and_container_removed() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("argv.log");
        let script = dir.path().join("docker");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$@\" >> '{}'\nif [ \"$1\" = run ]; then exec sleep 30; fi\n",
                log.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let docker = DockerCli::new(script.to_string_lossy(), Duration::from_millis(300));
        let spec = RunSpec {
            image: "img:1".into(),
            name: "get-cuda-cores".into(),
            devices: Vec::new(),
            volumes: BTreeMap::new(),
        };

        let start = std::time::Instant::now();
        let err = docker.run_container(&spec).await.unwrap_err();

        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(matches!(err, RuntimeError::Timeout { .. }));
        assert_eq!(err.class(), ErrorClass::Degrade);
        assert_eq!(
            std::fs::read_to_string(&log).unwrap(),
            "run --rm --name get-cuda-cores img:1\nrm --force get-cuda-cores\n"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_is_degraded() {
        // `false` ignores its arguments and exits 1
        let docker = DockerCli::new("false", Duration::from_secs(5));

        let err = docker.remove_container("get-cuda-cores").await.unwrap_err();
        assert!(matches!(err, RuntimeError::CommandFailed { code: Some(1), .. }));
        assert_eq!(err.class(), ErrorClass::Degrade);
    }
}
