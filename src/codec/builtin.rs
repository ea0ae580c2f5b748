//! Built-in kinds
//!
//! Schemas for the core objects most often inspected straight from etcd.
//! Field tags follow the `generated.proto` files of k8s.io/api and
//! k8s.io/apimachinery.

use super::registry::Registry;
use super::schema::FieldType::{
    Bool, BytesMap, Int32, Int64, Message, MicroTime, RawJson, StringMap, Time,
    String as Str,
};
use super::schema::{Field, MessageSchema};

// =============================================================================
// meta/v1
// =============================================================================

pub static OWNER_REFERENCE: MessageSchema = MessageSchema {
    name: "OwnerReference",
    fields: &[
        Field::new("apiVersion", 5, Str),
        Field::new("kind", 1, Str),
        Field::new("name", 3, Str),
        Field::new("uid", 4, Str),
        Field::new("controller", 6, Bool),
        Field::new("blockOwnerDeletion", 7, Bool),
    ],
};

pub static MANAGED_FIELDS_ENTRY: MessageSchema = MessageSchema {
    name: "ManagedFieldsEntry",
    fields: &[
        Field::new("manager", 1, Str),
        Field::new("operation", 2, Str),
        Field::new("apiVersion", 3, Str),
        Field::new("time", 4, Time),
        Field::new("fieldsType", 6, Str),
        Field::new("fieldsV1", 7, RawJson),
        Field::new("subresource", 8, Str),
    ],
};

pub static OBJECT_META: MessageSchema = MessageSchema {
    name: "ObjectMeta",
    fields: &[
        Field::new("name", 1, Str),
        Field::new("generateName", 2, Str),
        Field::new("namespace", 3, Str),
        Field::new("selfLink", 4, Str),
        Field::new("uid", 5, Str),
        Field::new("resourceVersion", 6, Str),
        Field::new("generation", 7, Int64),
        Field::new("creationTimestamp", 8, Time),
        Field::new("deletionTimestamp", 9, Time),
        Field::new("deletionGracePeriodSeconds", 10, Int64),
        Field::new("labels", 11, StringMap),
        Field::new("annotations", 12, StringMap),
        Field::repeated("ownerReferences", 13, Message(&OWNER_REFERENCE)),
        Field::repeated("finalizers", 14, Str),
        Field::repeated("managedFields", 17, Message(&MANAGED_FIELDS_ENTRY)),
    ],
};

// =============================================================================
// core/v1
// =============================================================================

pub static CONFIG_MAP: MessageSchema = MessageSchema {
    name: "ConfigMap",
    fields: &[
        Field::new("metadata", 1, Message(&OBJECT_META)),
        Field::new("immutable", 4, Bool),
        Field::new("data", 2, StringMap),
        Field::new("binaryData", 3, BytesMap),
    ],
};

pub static SECRET: MessageSchema = MessageSchema {
    name: "Secret",
    fields: &[
        Field::new("metadata", 1, Message(&OBJECT_META)),
        Field::new("immutable", 5, Bool),
        Field::new("data", 2, BytesMap),
        Field::new("stringData", 4, StringMap),
        Field::new("type", 3, Str),
    ],
};

pub static NAMESPACE_CONDITION: MessageSchema = MessageSchema {
    name: "NamespaceCondition",
    fields: &[
        Field::new("type", 1, Str),
        Field::new("status", 2, Str),
        Field::new("lastTransitionTime", 4, Time),
        Field::new("reason", 5, Str),
        Field::new("message", 6, Str),
    ],
};

pub static NAMESPACE_SPEC: MessageSchema = MessageSchema {
    name: "NamespaceSpec",
    fields: &[Field::repeated("finalizers", 1, Str)],
};

pub static NAMESPACE_STATUS: MessageSchema = MessageSchema {
    name: "NamespaceStatus",
    fields: &[
        Field::new("phase", 1, Str),
        Field::repeated("conditions", 2, Message(&NAMESPACE_CONDITION)),
    ],
};

pub static NAMESPACE: MessageSchema = MessageSchema {
    name: "Namespace",
    fields: &[
        Field::new("metadata", 1, Message(&OBJECT_META)),
        Field::new("spec", 2, Message(&NAMESPACE_SPEC)),
        Field::new("status", 3, Message(&NAMESPACE_STATUS)),
    ],
};

pub static OBJECT_REFERENCE: MessageSchema = MessageSchema {
    name: "ObjectReference",
    fields: &[
        Field::new("kind", 1, Str),
        Field::new("namespace", 2, Str),
        Field::new("name", 3, Str),
        Field::new("uid", 4, Str),
        Field::new("apiVersion", 5, Str),
        Field::new("resourceVersion", 6, Str),
        Field::new("fieldPath", 7, Str),
    ],
};

pub static LOCAL_OBJECT_REFERENCE: MessageSchema = MessageSchema {
    name: "LocalObjectReference",
    fields: &[Field::new("name", 1, Str)],
};

pub static SERVICE_ACCOUNT: MessageSchema = MessageSchema {
    name: "ServiceAccount",
    fields: &[
        Field::new("metadata", 1, Message(&OBJECT_META)),
        Field::repeated("secrets", 2, Message(&OBJECT_REFERENCE)),
        Field::repeated("imagePullSecrets", 3, Message(&LOCAL_OBJECT_REFERENCE)),
        Field::new("automountServiceAccountToken", 4, Bool),
    ],
};

// =============================================================================
// coordination.k8s.io/v1
// =============================================================================

pub static LEASE_SPEC: MessageSchema = MessageSchema {
    name: "LeaseSpec",
    fields: &[
        Field::new("holderIdentity", 1, Str),
        Field::new("leaseDurationSeconds", 2, Int32),
        Field::new("acquireTime", 3, MicroTime),
        Field::new("renewTime", 4, MicroTime),
        Field::new("leaseTransitions", 5, Int32),
        Field::new("strategy", 6, Str),
        Field::new("preferredHolder", 7, Str),
    ],
};

pub static LEASE: MessageSchema = MessageSchema {
    name: "Lease",
    fields: &[
        Field::new("metadata", 1, Message(&OBJECT_META)),
        Field::new("spec", 2, Message(&LEASE_SPEC)),
    ],
};

/// Register every built-in kind
pub fn install(registry: &mut Registry) {
    registry.register("v1", "ConfigMap", &CONFIG_MAP);
    registry.register("v1", "Secret", &SECRET);
    registry.register("v1", "Namespace", &NAMESPACE);
    registry.register("v1", "ServiceAccount", &SERVICE_ACCOUNT);
    registry.register("coordination.k8s.io/v1", "Lease", &LEASE);
}
