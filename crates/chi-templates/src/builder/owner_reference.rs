use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use snafu::{OptionExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("owner resource has no name"))]
    MissingName,

    #[snafu(display("owner resource {name:?} has no uid"))]
    MissingUid { name: String },
}

/// Returns the owner references for an object created on behalf of `owner`.
///
/// Returns [`None`] if `skip` is set, so that the objects outlive their owner. Otherwise `owner`
/// becomes the single, controlling owner, and blocks its own deletion until the object is gone.
pub fn owner_references<R: Resource<DynamicType = ()>>(
    owner: &R,
    skip: bool,
) -> Result<Option<Vec<OwnerReference>>> {
    if skip {
        return Ok(None);
    }
    Ok(Some(vec![controller_reference(owner)?]))
}

pub fn controller_reference<R: Resource<DynamicType = ()>>(owner: &R) -> Result<OwnerReference> {
    let meta = owner.meta();
    let name = meta.name.clone().context(MissingNameSnafu)?;
    let uid = meta.uid.clone().context(MissingUidSnafu { name: &name })?;
    Ok(OwnerReference {
        api_version: R::api_version(&()).into_owned(),
        kind: R::kind(&()).into_owned(),
        name,
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}
