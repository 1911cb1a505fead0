use claims::*;
use compute::auth::{CredentialProvider, StaticTokenCredential};
use compute::common::{ConfigurationError, FactoryError};
use compute::config::{Configuration, ConfigurationRegistry};
use compute::execution::{ContextKind, ExecutionContext, PoolSettings};
use compute::{ClientFactory, ContextOwnership, ContextSource, create_default, create_with_config};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

mod helpers {
    use super::*;

    pub fn credential() -> Arc<dyn CredentialProvider> {
        Arc::new(StaticTokenCredential::new("test-token"))
    }

    pub fn valid_config() -> Configuration {
        Configuration::builder()
            .endpoint("https://management.example.com")
            .subscription_id("sub-123")
            .credential(credential())
            .build()
    }

    pub fn small_pools() -> PoolSettings {
        PoolSettings {
            worker_threads: Some(1),
            ..PoolSettings::default()
        }
    }

    /// Context source that records how many pools the factory asked for.
    pub struct CountingPools {
        pub created: AtomicUsize,
    }

    impl ContextSource for CountingPools {
        fn create_context(&self) -> Result<ExecutionContext, FactoryError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            ExecutionContext::elastic(&small_pools())
                .map_err(|e| FactoryError::ExecutionContext(e.to_string()))
        }
    }

    pub fn counting_factory() -> (ClientFactory, Arc<CountingPools>) {
        let pools = Arc::new(CountingPools {
            created: AtomicUsize::new(0),
        });
        (ClientFactory::with_context_source(pools.clone()), pools)
    }
}

use helpers::*;

mod create_with_config_tests {
    use super::*;

    #[test]
    fn binds_configuration_by_value() {
        let config = valid_config();
        let client = assert_ok!(create_with_config(config.clone()));

        assert_eq!(**client.configuration(), config);
        assert_eq!(client.ownership(), ContextOwnership::Dedicated);
        assert_eq!(client.execution_context().kind(), ContextKind::Elastic);
        assert!(client.execution_context().owns_runtime());
    }

    #[test]
    fn missing_endpoint_is_rejected_without_allocating_a_pool() {
        let (factory, pools) = counting_factory();
        let config = Configuration::builder().credential(credential()).build();

        let err = assert_err!(factory.create_with_config(config));
        assert_eq!(
            err,
            FactoryError::InvalidConfiguration(ConfigurationError::MissingEndpoint)
        );
        assert_eq!(pools.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_credential_is_rejected_without_allocating_a_pool() {
        let (factory, pools) = counting_factory();
        let config = Configuration::builder()
            .endpoint("https://management.example.com")
            .build();

        let err = assert_err!(factory.create_with_config(config));
        assert_eq!(
            err,
            FactoryError::InvalidConfiguration(ConfigurationError::MissingCredentialProvider)
        );
        assert_eq!(pools.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn malformed_endpoint_is_rejected() {
        let config = Configuration::builder()
            .endpoint("not a url")
            .credential(credential())
            .build();

        assert_matches!(
            create_with_config(config),
            Err(FactoryError::InvalidConfiguration(
                ConfigurationError::InvalidEndpoint { .. }
            ))
        );
    }

    #[test]
    fn equal_configurations_get_distinct_clients_and_pools() {
        let (factory, pools) = counting_factory();
        let config = valid_config();

        let first = assert_ok!(factory.create_with_config(config.clone()));
        let second = assert_ok!(factory.create_with_config(config));

        assert_ne!(first.id(), second.id());
        assert_eq!(**first.configuration(), **second.configuration());
        assert!(
            !first
                .execution_context()
                .shares_pool_with(second.execution_context())
        );
        assert_eq!(pools.created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn pool_settings_are_honoured() {
        let factory = ClientFactory::new(PoolSettings {
            max_concurrent_tasks: Some(4),
            ..small_pools()
        });
        let client = assert_ok!(factory.create_with_config(valid_config()));
        assert_eq!(client.execution_context().kind(), ContextKind::Bounded(4));
    }

    #[test]
    fn shared_configuration_is_not_copied() {
        let factory = ClientFactory::new(small_pools());
        let shared = Arc::new(valid_config());

        let a = assert_ok!(factory.create_with_shared_config(shared.clone()));
        let b = assert_ok!(factory.create_with_shared_config(shared.clone()));

        assert!(Arc::ptr_eq(a.configuration(), &shared));
        assert!(Arc::ptr_eq(b.configuration(), &shared));
    }
}

mod create_default_tests {
    use super::*;

    #[test]
    fn empty_registry_reports_missing_configuration() {
        let (factory, pools) = counting_factory();
        let registry = ConfigurationRegistry::new();

        assert_eq!(
            assert_err!(factory.create_default(&registry)),
            FactoryError::ConfigurationMissing
        );
        assert_eq!(pools.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn binds_the_registered_default() {
        let registry = ConfigurationRegistry::new();
        assert_ok!(registry.set(valid_config()));

        let client = assert_ok!(create_default(&registry));
        let config = client.configuration();
        assert_eq!(config.endpoint(), "https://management.example.com");
        assert_eq!(config.subscription_id(), Some("sub-123"));
        assert!(Arc::ptr_eq(config, &assert_some!(registry.get())));
    }

    #[test]
    fn each_default_client_gets_its_own_pool() {
        let registry = ConfigurationRegistry::new();
        assert_ok!(registry.set(valid_config()));
        let factory = ClientFactory::new(small_pools());

        let a = assert_ok!(factory.create_default(&registry));
        let b = assert_ok!(factory.create_default(&registry));
        assert!(!a.execution_context().shares_pool_with(b.execution_context()));
    }

    #[test]
    fn concurrent_construction_reads_one_default() {
        let registry = ConfigurationRegistry::new();
        let expected = assert_ok!(registry.set(valid_config()));
        let factory = ClientFactory::new(small_pools());

        let clients: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| factory.create_default(&registry)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("factory thread panicked"))
                .collect()
        });

        for client in clients {
            let client = assert_ok!(client);
            assert!(Arc::ptr_eq(client.configuration(), &expected));
        }
    }

    #[test]
    fn concurrent_first_use_loads_once() {
        let registry = ConfigurationRegistry::new();
        let loads = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let config = registry
                        .get_or_try_init(|| {
                            loads.fetch_add(1, Ordering::SeqCst);
                            Ok(valid_config())
                        })
                        .expect("loader succeeds");
                    assert_eq!(config.subscription_id(), Some("sub-123"));
                });
            }
        });

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(registry.is_initialized());
    }
}

mod shared_context_tests {
    use super::*;

    #[test]
    fn shared_context_survives_client_shutdown() {
        let factory = ClientFactory::new(small_pools());
        let context = assert_ok!(ExecutionContext::elastic(&small_pools()));

        let a = assert_ok!(factory.create_with_context(valid_config(), context.clone()));
        let b = assert_ok!(factory.create_with_context(valid_config(), context.clone()));
        assert_eq!(a.ownership(), ContextOwnership::Shared);
        assert!(a.execution_context().shares_pool_with(&context));
        assert!(b.execution_context().shares_pool_with(&context));

        a.shutdown();
        assert!(!context.is_shutdown());

        let answer = b.spawn(async { 7 });
        assert_eq!(context.block_on(answer).unwrap(), Some(7));

        context.shutdown();
        assert!(b.execution_context().is_shutdown());
    }

    #[test]
    fn shared_context_still_requires_valid_configuration() {
        let context = assert_ok!(ExecutionContext::elastic(&small_pools()));
        let config = Configuration::builder()
            .endpoint("https://management.example.com")
            .build();

        assert_matches!(
            compute::create_with_context(config, context),
            Err(FactoryError::InvalidConfiguration(
                ConfigurationError::MissingCredentialProvider
            ))
        );
    }

    #[test]
    fn dedicated_shutdown_stops_the_clients_pool() {
        let client = assert_ok!(ClientFactory::new(small_pools()).create_with_config(valid_config()));
        let context = client.execution_context().clone();

        client.shutdown();
        assert!(context.is_shutdown());
    }

    #[tokio::test]
    async fn callers_runtime_can_back_a_client() {
        let context = assert_some!(ExecutionContext::current());
        let client = assert_ok!(compute::create_with_context(valid_config(), context));

        assert_eq!(client.execution_context().kind(), ContextKind::Borrowed);
        assert_eq!(client.spawn(async { "done" }).await.unwrap(), Some("done"));
    }
}

mod client_surface_tests {
    use super::*;
    use compute::common::ClientError;

    #[test]
    fn resource_url_is_subscription_scoped() {
        let client = assert_ok!(ClientFactory::new(small_pools()).create_with_config(valid_config()));
        assert_eq!(
            assert_ok!(client.resource_url("virtualMachines")),
            "https://management.example.com/subscriptions/sub-123/providers/Microsoft.Compute/virtualMachines?api-version=2024-07-01"
        );
        assert_eq!(
            assert_ok!(client.resource_url("/locations/west europe/vmSizes/")),
            "https://management.example.com/subscriptions/sub-123/providers/Microsoft.Compute/locations/west%20europe/vmSizes?api-version=2024-07-01"
        );
    }

    #[test]
    fn resource_url_rejects_traversal_and_empty_paths() {
        let client = assert_ok!(ClientFactory::new(small_pools()).create_with_config(valid_config()));
        assert_matches!(client.resource_url(""), Err(ClientError::InvalidPath(_)));
        assert_matches!(
            client.resource_url("virtualMachines/../disks"),
            Err(ClientError::InvalidPath(_))
        );
        assert_matches!(
            client.resource_url("virtualMachines//vm"),
            Err(ClientError::InvalidPath(_))
        );
    }

    #[test]
    fn resource_url_requires_subscription() {
        let config = Configuration::builder()
            .endpoint("https://management.example.com/")
            .credential(credential())
            .build();
        let client = assert_ok!(ClientFactory::new(small_pools()).create_with_config(config));
        assert_eq!(
            client.resource_url("virtualMachines"),
            Err(ClientError::MissingSubscription)
        );
    }

    #[test]
    fn management_scope_uses_endpoint_origin() {
        let config = Configuration::builder()
            .endpoint("https://management.example.com/some/base/")
            .credential(credential())
            .build();
        let client = assert_ok!(ClientFactory::new(small_pools()).create_with_config(config));
        assert_eq!(
            assert_ok!(client.management_scope()),
            "https://management.example.com/.default"
        );
    }

    #[test]
    fn authorization_header_comes_from_credential() {
        let client = assert_ok!(ClientFactory::new(small_pools()).create_with_config(valid_config()));
        let header = client
            .execution_context()
            .block_on(client.authorization_header());
        assert_eq!(assert_ok!(header), "Bearer test-token");
    }
}
