pub(crate) mod connect;
pub(crate) mod query;

/// Product identifier flown in PRDID and PRDDTA, eight characters.
pub(crate) const PRODUCT_ID: &str = "RDC00600";

/// External name of this client, flown in EXCSAT.
pub(crate) const EXTERNAL_NAME: &str = "db2connect_application RDC00600";

/// Platform identifier inside PRDDTA, eighteen characters.
pub(crate) const PLATFORM_ID: &str = "RUST              ";

/// Type definition name announced in ACCRDB.
pub(crate) const TYPDEF_ASC: &str = "QTDSQLASC";

/// Server class name of this client.
pub(crate) const SERVER_CLASS_NAME: &str = "QDB2/RUST";
