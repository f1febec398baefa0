use dobj_shared::{AnyObjRef, Path, ResolveError, Subscriber};

/// Walk a path from the root. Each step consults the current object's
/// field table: only collection fields may appear in a path. The
/// collection runs its access predicate (when a subscriber is given;
/// `None` is a trusted local resolution), then materialises or reuses the
/// child through its per-key memo, so concurrent resolvers of one key
/// share a single construction and populate run.
pub async fn resolve_path(
    root: AnyObjRef,
    subscriber: Option<Subscriber>,
    path: &Path,
) -> Result<AnyObjRef, ResolveError> {
    let mut current = root;
    for seg in path.segments() {
        let future = {
            let object = current.borrow();
            let Some(collection) = object.collection(seg.collection_id) else {
                return Err(ResolveError::NotACollection {
                    field_id: seg.collection_id,
                });
            };
            collection.resolve_child(subscriber.clone(), seg.key.clone())
        };
        current = future.await?;
    }
    Ok(current)
}
