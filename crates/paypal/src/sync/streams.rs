//! Entity descriptors
//!
//! Each PayPal entity is described by data: endpoint, pagination mode,
//! replication mode and flattening rules. One generic runner interprets
//! every descriptor.

use serde_json::{Map, Value};

use super::Window;
use crate::api::{Method, RequestBody};
use crate::timestamp::format_timestamp;

/// How successive pages are discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// Follow `links[rel=next]`
    Cursor,
    /// Single response
    None,
}

/// How progress is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replication {
    /// Date-windowed, bookmarked on `replication_key`
    Incremental {
        /// Flattened field holding the record's update time
        replication_key: &'static str,
        /// Window width in days
        window_days: u32,
        /// Oldest data the endpoint serves, in days
        max_history_days: Option<u32>,
        /// Query/body parameter names for the window bounds
        start_param: &'static str,
        end_param: &'static str,
    },
    /// Full snapshot every run, no bookmark
    FullTable,
}

/// Static description of one extractable entity
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub name: &'static str,
    /// Endpoint path relative to the API host
    pub path: &'static str,
    pub method: Method,
    /// Envelope key holding the records
    pub data_key: &'static str,
    /// Flattened fields that uniquely identify a record
    pub key_properties: &'static [&'static str],
    pub pagination: Pagination,
    pub replication: Replication,
    /// Nested objects lifted into `<parent>_<child>` fields
    pub denest: &'static [&'static str],
    /// Envelope fields merged into every record of a page
    pub context_fields: &'static [&'static str],
    /// Parameters sent with every request
    pub params: &'static [(&'static str, &'static str)],
}

impl EntityDescriptor {
    /// Replication key for incremental entities
    pub fn replication_key(&self) -> Option<&'static str> {
        match self.replication {
            Replication::Incremental {
                replication_key, ..
            } => Some(replication_key),
            Replication::FullTable => None,
        }
    }

    pub fn is_incremental(&self) -> bool {
        matches!(self.replication, Replication::Incremental { .. })
    }

    /// Request parameters, including window bounds when given
    ///
    /// The window's fetch range starts one unit before the window itself.
    pub fn request_params(&self, window: Option<&Window>) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = Vec::new();
        if let (
            Some(window),
            Replication::Incremental {
                start_param,
                end_param,
                ..
            },
        ) = (window, self.replication)
        {
            params.push((start_param.to_string(), format_timestamp(window.fetch_start())));
            params.push((end_param.to_string(), format_timestamp(window.end)));
        }
        params.extend(
            self.params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        params
    }

    /// Split parameters into query string and body according to the method
    ///
    /// GET sends everything as query parameters; POST sends a JSON object body.
    pub fn request_parts(
        &self,
        window: Option<&Window>,
    ) -> (Vec<(String, String)>, Option<RequestBody>) {
        let params = self.request_params(window);
        match self.method {
            Method::Get => (params, None),
            Method::Post => {
                let body: Map<String, Value> = params
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect();
                (Vec::new(), Some(RequestBody::Json(Value::Object(body))))
            }
        }
    }
}

/// Transaction history, windowed on update time
pub const TRANSACTIONS: EntityDescriptor = EntityDescriptor {
    name: "transactions",
    path: "v1/reporting/transactions",
    method: Method::Get,
    data_key: "transaction_details",
    key_properties: &["transaction_info_transaction_id"],
    pagination: Pagination::Cursor,
    replication: Replication::Incremental {
        replication_key: "transaction_info_transaction_updated_date",
        // API rejects ranges longer than 31 days
        window_days: 31,
        // ~3 years of history
        max_history_days: Some(1095),
        start_param: "start_date",
        end_param: "end_date",
    },
    denest: &[
        "transaction_info",
        "payer_info",
        "shipping_info",
        "cart_info",
        "store_info",
        "auction_info",
        "incentive_info",
    ],
    context_fields: &["account_number", "last_refreshed_datetime"],
    params: &[("fields", "all"), ("page_size", "500")],
};

/// Current balances, snapshot
pub const BALANCES: EntityDescriptor = EntityDescriptor {
    name: "balances",
    path: "v1/reporting/balances",
    method: Method::Get,
    data_key: "balances",
    key_properties: &["currency"],
    pagination: Pagination::None,
    replication: Replication::FullTable,
    denest: &["total_balance", "available_balance", "withheld_balance"],
    context_fields: &["account_id", "as_of_time", "last_refresh_time"],
    params: &[],
};

/// All known entities, in default sync order
pub fn catalog() -> Vec<&'static EntityDescriptor> {
    vec![&TRANSACTIONS, &BALANCES]
}

/// Look up an entity by name
pub fn find_entity(name: &str) -> Option<&'static EntityDescriptor> {
    catalog().into_iter().find(|e| e.name == name)
}
