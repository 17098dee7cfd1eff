//! Get-or-create and delete-if-exists primitives shared by every reconciler

use infra_api::{ComputeResource, ResourceKey};
use tracing::{debug, error, info};

use crate::cloud::ResourceClient;
use crate::context::CallContext;
use crate::{Error, Result};

/// Returns the resource at `key`, inserting `spec` first if it does not exist.
///
/// The provider does not hand back the created object, so an insert is always
/// followed by a fresh get.
pub async fn ensure<T, C>(ctx: &CallContext, client: &C, key: &ResourceKey, spec: &T) -> Result<T>
where
    T: ComputeResource,
    C: ResourceClient<T> + ?Sized,
{
    ctx.check()?;
    debug!(kind = T::KIND, key = %key, "Looking for resource");
    match client.get(ctx, key).await {
        Ok(existing) => return Ok(existing),
        Err(e) if e.is_not_found() => {}
        Err(e) => {
            error!(kind = T::KIND, key = %key, error = %e, "Error looking for resource");
            return Err(e);
        }
    }

    info!(kind = T::KIND, key = %key, "Creating resource");
    if let Err(e) = client.insert(ctx, key, spec).await {
        error!(kind = T::KIND, key = %key, error = %e, "Error creating resource");
        return Err(e);
    }

    client.get(ctx, key).await
}

/// Looks a resource up, mapping NotFound to `None`
pub async fn find<T, C>(ctx: &CallContext, client: &C, key: &ResourceKey) -> Result<Option<T>>
where
    T: ComputeResource,
    C: ResourceClient<T> + ?Sized,
{
    ctx.check()?;
    match client.get(ctx, key).await {
        Ok(found) => Ok(Some(found)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Deletes the resource at `key`; a resource that is already gone counts as deleted
pub async fn delete_if_exists<T, C>(ctx: &CallContext, client: &C, key: &ResourceKey) -> Result<()>
where
    T: ComputeResource,
    C: ResourceClient<T> + ?Sized,
{
    ctx.check()?;
    info!(kind = T::KIND, key = %key, "Deleting resource");
    match client.delete(ctx, key).await {
        Ok(()) => Ok(()),
        Err(Error::NotFound { .. }) => {
            debug!(kind = T::KIND, key = %key, "Resource already deleted");
            Ok(())
        }
        Err(e) => {
            error!(kind = T::KIND, key = %key, error = %e, "Error deleting resource");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::ComputeCloud;
    use crate::fake::{FakeCloud, Verb};
    use infra_api::compute::Network;

    fn network(name: &str) -> Network {
        Network {
            name: name.to_string(),
            auto_create_subnetworks: Some(true),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_ensure_creates_then_refetches() {
        let cloud = FakeCloud::new();
        let ctx = CallContext::background();
        let key = ResourceKey::global("net1");

        let created = ensure(&ctx, cloud.networks(), &key, &network("net1"))
            .await
            .unwrap();

        assert_eq!(created.name, "net1");
        assert!(!created.self_link.is_empty());
        assert_eq!(
            cloud.calls_for("network"),
            vec![Verb::Get, Verb::Insert, Verb::Get]
        );
    }

    #[tokio::test]
    async fn test_ensure_returns_existing_without_insert() {
        let cloud = FakeCloud::new();
        let ctx = CallContext::background();
        let key = ResourceKey::global("net1");
        cloud.networks.seed(&key, network("net1"));

        ensure(&ctx, cloud.networks(), &key, &network("net1"))
            .await
            .unwrap();

        assert!(cloud.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_aborts_on_lookup_error() {
        let cloud = FakeCloud::new();
        let ctx = CallContext::background();
        cloud.fail("network", Verb::Get, 403);

        let err = ensure(&ctx, cloud.networks(), &ResourceKey::global("net1"), &network("net1"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Api { code: 403, .. }));
        assert!(cloud.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_respects_cancellation() {
        let cloud = FakeCloud::new();
        let ctx = CallContext::background();
        ctx.cancel();

        let err = ensure(&ctx, cloud.networks(), &ResourceKey::global("net1"), &network("net1"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_if_exists_tolerates_missing() {
        let cloud = FakeCloud::new();
        let ctx = CallContext::background();

        delete_if_exists(&ctx, cloud.networks(), &ResourceKey::global("gone"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_find() {
        let cloud = FakeCloud::new();
        let ctx = CallContext::background();
        let key = ResourceKey::global("net1");

        assert!(find(&ctx, cloud.networks(), &key).await.unwrap().is_none());
        cloud.networks.seed(&key, network("net1"));
        assert!(find(&ctx, cloud.networks(), &key).await.unwrap().is_some());
    }
}
