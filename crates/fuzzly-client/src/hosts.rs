//! Service hosts per deployment environment
//!
//! Every fuzz.ly backend service lives on its own host. Local and test
//! deployments run them on consecutive localhost ports, dev and prod on
//! `fuzz.ly` subdomains.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Environment variable consulted by [`Environment::from_env`]
pub const ENVIRONMENT_VAR: &str = "ENVIRONMENT";

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    /// Automated tests
    Test,
    /// Local development stack
    #[default]
    Local,
    /// Shared development deployment
    Dev,
    /// Production
    Prod,
}

impl Environment {
    /// Read the environment from `ENVIRONMENT`, defaulting to [`Environment::Local`]
    pub fn from_env() -> Result<Self> {
        match std::env::var(ENVIRONMENT_VAR) {
            Ok(value) => value.parse(),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Lowercase name of the environment
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Test => "test",
            Environment::Local => "local",
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "local" => Ok(Environment::Local),
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            other => Err(Error::UnknownEnvironment(other.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fuzz.ly backend service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Authentication
    Auth,
    /// Media upload
    Upload,
    /// Tags
    Tag,
    /// Posts
    Post,
    /// Accounts and bot credentials
    Account,
    /// Users
    User,
    /// User configuration
    Config,
    /// Avro schema registry
    Avro,
}

impl Service {
    /// All services, in local port order
    pub const ALL: [Service; 8] = [
        Service::Auth,
        Service::Upload,
        Service::Tag,
        Service::Post,
        Service::Account,
        Service::User,
        Service::Config,
        Service::Avro,
    ];

    fn subdomain(&self) -> &'static str {
        match self {
            Service::Auth => "auth",
            Service::Upload => "upload",
            Service::Tag => "tags",
            Service::Post => "posts",
            Service::Account => "account",
            Service::User => "users",
            Service::Config => "config",
            Service::Avro => "avro",
        }
    }

    fn local_host(&self) -> String {
        match self {
            // auth binds to the loopback address rather than the name
            Service::Auth => "http://127.0.0.1:5000".to_string(),
            other => format!("http://localhost:{}", 5000 + other.index()),
        }
    }

    fn index(&self) -> u16 {
        match self {
            Service::Auth => 0,
            Service::Upload => 1,
            Service::Tag => 2,
            Service::Post => 3,
            Service::Account => 4,
            Service::User => 5,
            Service::Config => 6,
            Service::Avro => 7,
        }
    }
}

/// Base URLs of every service for one deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHosts {
    hosts: [String; 8],
}

impl ServiceHosts {
    /// Hosts for the given environment
    pub fn for_environment(env: Environment) -> Self {
        let hosts = Service::ALL.map(|service| match env {
            Environment::Test | Environment::Local => service.local_host(),
            Environment::Dev => format!("https://{}-dev.fuzz.ly", service.subdomain()),
            Environment::Prod => format!("https://{}.fuzz.ly", service.subdomain()),
        });

        Self { hosts }
    }

    /// Base URL of a service, without a trailing slash
    pub fn host(&self, service: Service) -> &str {
        &self.hosts[service.index() as usize]
    }

    /// Point one service at a different base URL
    pub fn with_host(mut self, service: Service, url: impl Into<String>) -> Self {
        let url = url.into();
        self.hosts[service.index() as usize] = url.trim_end_matches('/').to_string();
        self
    }
}

impl Default for ServiceHosts {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}
