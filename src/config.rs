//! Invocation configuration.
//!
//! Options arrive as a whitespace separated token list in `$ESX`, in the same
//! `-flag value` shape the Go toolchain's exec wrappers have always accepted.
//! The remote layout is derived from where the caller is sitting in its
//! source tree, so two runs from the same package land in the same place.

use crate::error::{Error, Result};
use crate::ssh::AuthChain;
use clap::{ArgAction, Parser};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

/// Environment variable holding the option tokens.
pub const OPTIONS_VAR: &str = "ESX";

/// Options recognized in `$ESX`.
#[derive(Clone, Debug, Parser, PartialEq)]
#[command(name = "esx-exec", no_binary_name = true, disable_help_flag = true)]
pub struct Options {
    /// Target host
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub esx: String,

    /// SSH port on the target
    #[arg(long, default_value_t = 22)]
    pub port: u16,

    /// SSH user
    #[arg(long, default_value = "root", allow_hyphen_values = true)]
    pub user: String,

    /// SSH password, also used to answer keyboard-interactive prompts
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub passwd: String,

    /// Root directory on the target
    #[arg(long, default_value = "/tmp", allow_hyphen_values = true)]
    pub root: String,

    /// Keep the executable on the target
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true"
    )]
    pub keep: bool,

    /// Memory reservation, 0 for none
    #[arg(long, default_value_t = 0)]
    pub mem: u64,
}

impl Options {
    /// Parse a whitespace separated token list.
    pub fn from_tokens(tokens: &str) -> Result<Self> {
        Self::try_parse_from(flag_args(tokens)).map_err(|e| Error::Options {
            var: OPTIONS_VAR,
            message: e.to_string().trim_end().to_string(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_tokens(&std::env::var(OPTIONS_VAR).unwrap_or_default())
    }
}

/// Options that never consume the following token.
const BOOL_FLAGS: &[&str] = &["keep"];

/// Rewrite Go flag syntax into clap's.
///
/// Go's flag package takes `-name` and `--name` alike, binds the next token
/// to a value-taking option whatever it looks like, and stops at the first
/// token that is not a flag. Values are glued on with `=` so clap never has
/// to guess whether `-s3cret` is an option.
fn flag_args(tokens: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut tokens = tokens.split_whitespace();

    while let Some(token) = tokens.next() {
        let name = token
            .strip_prefix("--")
            .or_else(|| token.strip_prefix('-'))
            .filter(|name| !name.is_empty());
        let Some(name) = name else {
            if token != "--" {
                log::debug!("Ignoring ${} from {:?} on", OPTIONS_VAR, token);
            }
            break;
        };

        if name.contains('=') || BOOL_FLAGS.contains(&name) {
            args.push(format!("--{name}"));
            continue;
        }
        match tokens.next() {
            Some(value) => args.push(format!("--{name}={value}")),
            None => args.push(format!("--{name}")),
        }
    }
    args
}

/// The two places a package directory may live under.
#[derive(Clone, Debug, Default)]
pub struct SourceRoots {
    /// `GOROOT`
    pub root: Option<PathBuf>,
    /// `GOPATH` entries, in order
    pub search: Vec<PathBuf>,
}

impl SourceRoots {
    pub fn from_env() -> Self {
        let root = std::env::var_os("GOROOT")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let search = match std::env::var_os("GOPATH").filter(|v| !v.is_empty()) {
            Some(list) => std::env::split_paths(&list)
                .filter(|p| !p.as_os_str().is_empty())
                .collect(),
            None => std::env::var_os("HOME")
                .map(|home| vec![PathBuf::from(home).join("go")])
                .unwrap_or_default(),
        };

        Self { root, search }
    }

    /// Path of `cwd` relative to the first root containing it, with the
    /// conventional leading `src` dropped.
    pub fn subdir(&self, cwd: &Path) -> Result<PathBuf> {
        let rel = self
            .root
            .iter()
            .chain(self.search.iter())
            .find_map(|base| cwd.strip_prefix(base).ok())
            .ok_or_else(|| Error::OutsideSourceRoots {
                cwd: cwd.to_path_buf(),
                root: self.root.clone(),
                search: self.search.clone(),
            })?;

        Ok(rel.strip_prefix("src").unwrap_or(rel).to_path_buf())
    }
}

/// Joins a remote base and a relative path with `/`, whatever the local
/// separator is.
pub fn remote_join(base: &str, rel: &Path) -> String {
    let mut joined = base.trim_end_matches('/').to_string();
    for part in normal_components(rel) {
        joined.push('/');
        joined.push_str(&part);
    }
    if joined.is_empty() {
        joined.push('/');
    }
    joined
}

/// Single segment name for the uploaded binary: the package path and the
/// binary's file name, flattened with `_`.
pub fn remote_name(subdir: &Path, binary: &Path) -> Result<String> {
    let file = binary
        .file_name()
        .ok_or_else(|| Error::BinaryName(binary.to_path_buf()))?;

    let parts: Vec<String> = normal_components(subdir)
        .chain(std::iter::once(file.to_string_lossy().into_owned()))
        .collect();

    Ok(parts.join("_").replace(['/', '\\'], "_"))
}

fn normal_components(path: &Path) -> impl Iterator<Item = String> + '_ {
    path.components().filter_map(|c| match c {
        Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
        _ => None,
    })
}

/// Fully resolved configuration for one invocation.
#[derive(Clone, Debug, Serialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip)]
    pub password: String,
    /// Remote root directory
    pub root_dir: String,
    /// Remote working directory, `<root_dir>/<package path>`
    pub test_dir: String,
    /// Name of the uploaded binary under `root_dir`
    pub remote_name: String,
    pub keep: bool,
    pub mem: Option<u64>,
}

impl Config {
    /// Build the configuration for running `binary` from `cwd`.
    pub fn resolve(
        options: Options,
        roots: &SourceRoots,
        cwd: &Path,
        binary: &Path,
    ) -> Result<Self> {
        let subdir = roots.subdir(cwd)?;
        let remote_name = remote_name(&subdir, binary)?;
        let test_dir = remote_join(&options.root, &subdir);

        Ok(Self {
            host: options.esx,
            port: options.port,
            user: options.user,
            password: options.passwd,
            root_dir: options.root,
            test_dir,
            remote_name,
            keep: options.keep,
            mem: Some(options.mem).filter(|m| *m != 0),
        })
    }

    /// Resolve from `$ESX`, `GOROOT`/`GOPATH` and the current directory.
    pub fn from_env(binary: &Path) -> Result<Self> {
        let options = Options::from_env()?;
        let cwd = std::env::current_dir().map_err(Error::CurrentDir)?;
        let config = Self::resolve(options, &SourceRoots::from_env(), &cwd, binary)?;

        if log::log_enabled!(log::Level::Debug) {
            if let Ok(json) = serde_json::to_string(&config) {
                log::debug!("Resolved configuration: {}", json);
            }
        }
        Ok(config)
    }

    /// Full remote path of the uploaded binary.
    pub fn remote_binary(&self) -> String {
        remote_join(&self.root_dir, Path::new(&self.remote_name))
    }

    /// Authentication methods to offer, in order.
    pub fn auth_chain(&self) -> AuthChain {
        AuthChain::new(&self.password, default_key_path().as_deref())
    }
}

fn default_key_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| Path::new(&home).join(".ssh").join("id_rsa"))
}
