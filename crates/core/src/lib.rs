pub mod dashboard;
pub mod domain;
pub mod storage;

pub mod config {
    use anyhow::Context;

    const DEFAULT_STOCK_DETAILS_RPC: &str = "get_stock_details";
    const DEFAULT_STOCK_DETAILS_RPC_PARAM: &str = "ticker_param";

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum StoreBackend {
        /// Hosted Supabase REST surface (`SUPABASE_URL` + key).
        Postgrest,
        /// Direct Postgres connection (`DATABASE_URL`).
        Postgres,
    }

    impl std::str::FromStr for StoreBackend {
        type Err = anyhow::Error;

        fn from_str(s: &str) -> anyhow::Result<Self> {
            match s.trim().to_ascii_lowercase().as_str() {
                "postgrest" | "supabase" => Ok(Self::Postgrest),
                "postgres" | "postgresql" => Ok(Self::Postgres),
                other => anyhow::bail!("unknown STORE_BACKEND: {other}"),
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub store_backend: StoreBackend,
        pub database_url: Option<String>,
        pub supabase_url: Option<String>,
        pub supabase_key: Option<String>,
        pub stock_details_rpc: String,
        pub stock_details_rpc_param: String,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

            let store_backend = match var("STORE_BACKEND") {
                Some(s) => s.parse()?,
                None => StoreBackend::Postgrest,
            };

            let stock_details_rpc =
                var("STOCK_DETAILS_RPC").unwrap_or_else(|| DEFAULT_STOCK_DETAILS_RPC.to_string());
            let stock_details_rpc_param = var("STOCK_DETAILS_RPC_PARAM")
                .unwrap_or_else(|| DEFAULT_STOCK_DETAILS_RPC_PARAM.to_string());
            anyhow::ensure!(
                is_sql_identifier(&stock_details_rpc),
                "STOCK_DETAILS_RPC must be a plain identifier (got {stock_details_rpc:?})"
            );
            anyhow::ensure!(
                is_sql_identifier(&stock_details_rpc_param),
                "STOCK_DETAILS_RPC_PARAM must be a plain identifier (got {stock_details_rpc_param:?})"
            );

            Ok(Self {
                store_backend,
                database_url: var("DATABASE_URL"),
                supabase_url: var("SUPABASE_URL"),
                supabase_key: var("SUPABASE_KEY").or_else(|| var("SUPABASE_SERVICE_ROLE_KEY")),
                stock_details_rpc,
                stock_details_rpc_param,
                sentry_dsn: var("SENTRY_DSN"),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_supabase_url(&self) -> anyhow::Result<&str> {
            self.supabase_url
                .as_deref()
                .context("SUPABASE_URL is required")
        }

        pub fn require_supabase_key(&self) -> anyhow::Result<&str> {
            self.supabase_key
                .as_deref()
                .context("SUPABASE_KEY (or SUPABASE_SERVICE_ROLE_KEY) is required")
        }
    }

    /// Procedure names end up spliced into SQL, so only bare identifiers are allowed.
    pub fn is_sql_identifier(s: &str) -> bool {
        let mut chars = s.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

}
