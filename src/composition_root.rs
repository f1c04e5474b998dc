//! Composition root: the collaborators both stages share. Feature-level DI
//! containers are wired per event because they carry tenant credentials.

use std::sync::Arc;

use shared::credentials::StsCredentialsVendor;

use crate::bootstrap::AwsEnv;
use crate::config::Config;

pub struct CompositionRoot {
    pub env: AwsEnv,
    pub credentials: Arc<StsCredentialsVendor>,
}

pub fn compose(env: AwsEnv, config: &Config) -> CompositionRoot {
    let credentials = Arc::new(StsCredentialsVendor::new(
        &env.sdk_config,
        config.app.xaccount_role.clone(),
    ));
    CompositionRoot { env, credentials }
}
