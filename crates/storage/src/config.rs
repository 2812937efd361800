#![forbid(unsafe_code)]

use crate::StoreError;
use std::path::PathBuf;
use std::time::Duration;

pub const STORAGE_DIR_ENV: &str = "LEASEBOOK_STORAGE_DIR";
pub const DELETE_POLICY_ENV: &str = "LEASEBOOK_DELETE_POLICY";
pub const BUSY_TIMEOUT_ENV: &str = "LEASEBOOK_BUSY_TIMEOUT_MS";
pub const CHILD_PAGE_SIZE_ENV: &str = "LEASEBOOK_CHILD_PAGE_SIZE";

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CHILD_PAGE_SIZE: usize = 64;
const MAX_CHILD_PAGE_SIZE: usize = 10_000;

/// What `delete` does with rows that still point at the contract.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeletePolicy {
    /// Refuse the delete while any dependent row exists.
    Restrict,
    /// Remove owned rows and mappings, detach clones, then delete.
    Cascade,
}

impl DeletePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Restrict => "restrict",
            Self::Cascade => "cascade",
        }
    }
}

impl std::str::FromStr for DeletePolicy {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "restrict" => Ok(Self::Restrict),
            "cascade" => Ok(Self::Cascade),
            _ => Err(StoreError::invalid(format!(
                "{DELETE_POLICY_ENV} must be restrict|cascade (got {value:?})"
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub storage_dir: PathBuf,
    pub delete_policy: DeletePolicy,
    pub busy_timeout: Duration,
    pub child_page_size: usize,
}

impl StoreConfig {
    pub fn new(storage_dir: impl Into<PathBuf>, delete_policy: DeletePolicy) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            delete_policy,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            child_page_size: DEFAULT_CHILD_PAGE_SIZE,
        }
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn with_child_page_size(mut self, child_page_size: usize) -> Self {
        self.child_page_size = child_page_size;
        self
    }

    /// Reads the process environment. The delete policy has no default and must
    /// be set explicitly.
    pub fn from_env(default_storage_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::from_lookup(default_storage_dir, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        default_storage_dir: impl Into<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, StoreError> {
        let storage_dir = lookup(STORAGE_DIR_ENV)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| default_storage_dir.into());

        let raw_policy = lookup(DELETE_POLICY_ENV)
            .ok_or_else(|| StoreError::invalid(format!("{DELETE_POLICY_ENV} is required")))?;
        let delete_policy = raw_policy.parse::<DeletePolicy>()?;

        let mut config = Self::new(storage_dir, delete_policy);
        if let Some(raw) = lookup(BUSY_TIMEOUT_ENV) {
            let millis = parse_u64(BUSY_TIMEOUT_ENV, &raw)?;
            config.busy_timeout = Duration::from_millis(millis);
        }
        if let Some(raw) = lookup(CHILD_PAGE_SIZE_ENV) {
            let size = parse_u64(CHILD_PAGE_SIZE_ENV, &raw)?;
            config.child_page_size = usize::try_from(size)
                .map_err(|_| StoreError::invalid(format!("{CHILD_PAGE_SIZE_ENV} overflows")))?;
        }
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        if self.child_page_size == 0 || self.child_page_size > MAX_CHILD_PAGE_SIZE {
            return Err(StoreError::invalid(format!(
                "child_page_size must be within 1..={MAX_CHILD_PAGE_SIZE}"
            )));
        }
        Ok(())
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, StoreError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| StoreError::invalid(format!("{key} must be a non-negative integer")))
}
