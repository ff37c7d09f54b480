//! WASI environment description.
//!
//! A [`WasiConfig`] collects arguments, environment, stdio and preopened
//! directories. Installing it in a store with
//! [`StoreContextMut::set_wasi`](crate::StoreContextMut::set_wasi) turns it
//! into a live WASI preview1 context.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;
use wasmtime_wasi::pipe::MemoryInputPipe;
use wasmtime_wasi::preview1::WasiP1Ctx;
use wasmtime_wasi::{DirPerms, FilePerms, OutputFile, WasiCtxBuilder};

use wasmbind_common::{Error, Result, StdioSetting, WasiError, WasiSettings};

#[derive(Debug, Default)]
enum Input {
    #[default]
    Null,
    Inherit,
    Bytes(Vec<u8>),
}

#[derive(Debug, Default)]
enum Output {
    #[default]
    Null,
    Inherit,
    File(File),
}

/// Builder for a WASI environment.
///
/// By default the guest sees no arguments, no environment, closed stdio and
/// no filesystem. Setters that open host files return `false` and leave the
/// configuration unchanged when the path cannot be used.
#[derive(Debug, Default)]
pub struct WasiConfig {
    args: Vec<String>,
    inherit_args: bool,
    env: Vec<(String, String)>,
    inherit_env: bool,
    stdin: Input,
    stdout: Output,
    stderr: Output,
    preopens: Vec<(PathBuf, String)>,
}

impl WasiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from declarative settings.
    ///
    /// # Errors
    ///
    /// Returns a WASI filesystem error naming the first path that could not
    /// be opened.
    pub fn from_settings(settings: &WasiSettings) -> Result<Self> {
        let mut config = Self::new();

        if settings.inherit_args {
            config.inherit_argv();
        } else {
            config.argv(settings.args.as_slice());
        }

        if settings.inherit_env {
            config.inherit_env();
        } else {
            let env: Vec<(&str, &str)> = settings
                .env
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            config.env(env.as_slice());
        }

        match &settings.stdin {
            StdioSetting::Null => {}
            StdioSetting::Inherit => {
                config.inherit_stdin();
            }
            StdioSetting::File(path) => {
                if !config.stdin_file(path) {
                    return Err(filesystem_error(path, "stdin"));
                }
            }
        }

        match &settings.stdout {
            StdioSetting::Null => {}
            StdioSetting::Inherit => {
                config.inherit_stdout();
            }
            StdioSetting::File(path) => {
                if !config.stdout_file(path) {
                    return Err(filesystem_error(path, "stdout"));
                }
            }
        }

        match &settings.stderr {
            StdioSetting::Null => {}
            StdioSetting::Inherit => {
                config.inherit_stderr();
            }
            StdioSetting::File(path) => {
                if !config.stderr_file(path) {
                    return Err(filesystem_error(path, "stderr"));
                }
            }
        }

        for preopen in &settings.preopens {
            if !config.preopen_dir(&preopen.host, &preopen.guest) {
                return Err(filesystem_error(&preopen.host, "preopen"));
            }
        }

        Ok(config)
    }

    /// Set the guest's argv, including the program name.
    pub fn argv(&mut self, args: &[impl AsRef<str>]) -> &mut Self {
        self.args = args.iter().map(|a| a.as_ref().to_owned()).collect();
        self.inherit_args = false;
        self
    }

    pub fn inherit_argv(&mut self) -> &mut Self {
        self.args.clear();
        self.inherit_args = true;
        self
    }

    pub fn env(&mut self, vars: &[(impl AsRef<str>, impl AsRef<str>)]) -> &mut Self {
        self.env = vars
            .iter()
            .map(|(k, v)| (k.as_ref().to_owned(), v.as_ref().to_owned()))
            .collect();
        self.inherit_env = false;
        self
    }

    pub fn inherit_env(&mut self) -> &mut Self {
        self.env.clear();
        self.inherit_env = true;
        self
    }

    /// Feed the contents of a host file to the guest's stdin.
    ///
    /// The file is read when this is called.
    pub fn stdin_file(&mut self, path: impl AsRef<Path>) -> bool {
        match std::fs::read(path.as_ref()) {
            Ok(bytes) => {
                self.stdin = Input::Bytes(bytes);
                true
            }
            Err(e) => {
                debug!(path = %path.as_ref().display(), error = %e, "Cannot read WASI stdin file");
                false
            }
        }
    }

    pub fn inherit_stdin(&mut self) -> &mut Self {
        self.stdin = Input::Inherit;
        self
    }

    /// Send the guest's stdout to a host file, created or truncated now.
    pub fn stdout_file(&mut self, path: impl AsRef<Path>) -> bool {
        match create_output(path.as_ref()) {
            Some(file) => {
                self.stdout = Output::File(file);
                true
            }
            None => false,
        }
    }

    pub fn inherit_stdout(&mut self) -> &mut Self {
        self.stdout = Output::Inherit;
        self
    }

    /// Send the guest's stderr to a host file, created or truncated now.
    pub fn stderr_file(&mut self, path: impl AsRef<Path>) -> bool {
        match create_output(path.as_ref()) {
            Some(file) => {
                self.stderr = Output::File(file);
                true
            }
            None => false,
        }
    }

    pub fn inherit_stderr(&mut self) -> &mut Self {
        self.stderr = Output::Inherit;
        self
    }

    /// Expose the host directory `host` to the guest as `guest`.
    pub fn preopen_dir(&mut self, host: impl AsRef<Path>, guest: &str) -> bool {
        let host = host.as_ref();
        if !host.is_dir() {
            debug!(path = %host.display(), "Cannot preopen WASI directory");
            return false;
        }
        self.preopens.push((host.to_path_buf(), guest.to_owned()));
        true
    }

    pub(crate) fn build(self) -> Result<WasiP1Ctx> {
        let mut builder = WasiCtxBuilder::new();

        if self.inherit_args {
            builder.inherit_args();
        } else {
            builder.args(self.args.as_slice());
        }

        if self.inherit_env {
            builder.inherit_env();
        } else {
            builder.envs(self.env.as_slice());
        }

        match self.stdin {
            Input::Null => {}
            Input::Inherit => {
                builder.inherit_stdin();
            }
            Input::Bytes(bytes) => {
                builder.stdin(MemoryInputPipe::new(bytes));
            }
        }

        match self.stdout {
            Output::Null => {}
            Output::Inherit => {
                builder.inherit_stdout();
            }
            Output::File(file) => {
                builder.stdout(OutputFile::new(file));
            }
        }

        match self.stderr {
            Output::Null => {}
            Output::Inherit => {
                builder.inherit_stderr();
            }
            Output::File(file) => {
                builder.stderr(OutputFile::new(file));
            }
        }

        for (host, guest) in &self.preopens {
            builder
                .preopened_dir(host, guest, DirPerms::all(), FilePerms::all())
                .map_err(|e| {
                    Error::from(WasiError::InitializationFailed {
                        reason: format!("cannot preopen {}: {e:#}", host.display()),
                    })
                })?;
        }

        Ok(builder.build_p1())
    }
}

fn create_output(path: &Path) -> Option<File> {
    match File::create(path) {
        Ok(file) => Some(file),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Cannot create WASI output file");
            None
        }
    }
}

fn filesystem_error(path: &str, operation: &str) -> Error {
    WasiError::FilesystemError {
        path: path.to_owned(),
        operation: operation.to_owned(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use wasmbind_common::PreopenSetting;

    const MISSING: &str = "/nonexistent/wasmbind/path";

    #[test]
    fn test_nonexistent_paths_rejected() {
        let mut config = WasiConfig::new();
        assert!(!config.stdin_file(MISSING));
        assert!(!config.stdout_file(format!("{MISSING}/out")));
        assert!(!config.stderr_file(format!("{MISSING}/err")));
        assert!(!config.preopen_dir(MISSING, "/"));
        assert!(config.preopens.is_empty());
    }

    #[test]
    fn test_argv_and_env_replace_inheritance() {
        let mut config = WasiConfig::new();
        config.inherit_argv().argv(&["prog", "--flag"]);
        assert!(!config.inherit_args);
        assert_eq!(config.args, ["prog", "--flag"]);

        config.env(&[("KEY", "value")]).inherit_env();
        assert!(config.inherit_env);
        assert!(config.env.is_empty());
    }

    #[test]
    fn test_preopen_existing_dir() {
        let mut config = WasiConfig::new();
        assert!(config.preopen_dir(std::env::temp_dir(), "/tmp"));
        config.build().unwrap();
    }

    #[test]
    fn test_from_settings() {
        let mut env = BTreeMap::new();
        env.insert("MODE".to_string(), "test".to_string());
        let settings = WasiSettings {
            args: vec!["app".to_string()],
            env,
            stdout: StdioSetting::Inherit,
            ..Default::default()
        };

        let config = WasiConfig::from_settings(&settings).unwrap();
        assert_eq!(config.args, ["app"]);
        assert_eq!(config.env, [("MODE".to_string(), "test".to_string())]);
        assert!(matches!(config.stdout, Output::Inherit));
        assert!(matches!(config.stdin, Input::Null));
        config.build().unwrap();
    }

    #[test]
    fn test_from_settings_names_bad_path() {
        let settings = WasiSettings {
            preopens: vec![PreopenSetting {
                host: MISSING.to_string(),
                guest: "/data".to_string(),
            }],
            ..Default::default()
        };

        let err = WasiConfig::from_settings(&settings).unwrap_err();
        assert!(matches!(
            err,
            Error::Wasi(WasiError::FilesystemError { ref path, .. }) if path == MISSING
        ));
    }
}
