#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Setting up error reporting failed")]
    InstallingColorEyre(#[source] color_eyre::Report),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("Mode '{0}' is disabled or cannot be built")]
    ModeUnavailable(crate::modes::ModeName),

    #[error("Rendering mode '{name}' failed")]
    Render {
        name: crate::modes::ModeName,
        #[source]
        source: crate::modes::ModeError,
    },

    #[error("Failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),

    #[error("Failed to install signal handler")]
    Signal(#[source] std::io::Error),
}
