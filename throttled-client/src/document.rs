//! Document payload
//!
//! The record submitted to the endpoint and its JSON encoding. The client
//! itself only ever sees the encoded bytes.

use serde::Deserialize;
use serde::Serialize;

/// Introduction-into-circulation document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    pub description: Description,
    pub doc_id: String,
    pub doc_status: String,
    pub doc_type: String,
    pub import_request: bool,
    pub owner_inn: String,
    pub participant_inn: String,
    pub producer_inn: String,
    pub production_date: String,
    pub production_type: String,
    pub products: Vec<Product>,
    pub reg_date: String,
    pub reg_number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Description {
    pub participant_inn: String,
}

/// One line item of a [`Document`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    pub certificate_document: String,
    pub certificate_document_date: String,
    pub certificate_document_number: String,
    pub owner_inn: String,
    pub producer_inn: String,
    pub production_date: String,
    pub tnved_code: String,
    pub uit_code: String,
    pub uitu_code: String,
}

/// Encodes a document as compact JSON.
pub fn serialize(document: &Document) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(document)
}

/// Encodes a document as indented JSON, for display.
pub fn serialize_pretty(document: &Document) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(document)
}

pub fn deserialize(bytes: &[u8]) -> Result<Document, serde_json::Error> {
    serde_json::from_slice(bytes)
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn sample() -> Document {
        Document {
            description: Description {
                participant_inn: "7700000000".to_string(),
            },
            doc_id: "doc-1".to_string(),
            import_request: true,
            products: vec![Product {
                tnved_code: "6401".to_string(),
                production_date: "2020-01-23".to_string(),
                ..Default::default()
            }],
            reg_date: "2020-01-23".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn it_uses_snake_case_field_names() {
        let bytes = serialize(&sample()).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["doc_id"], "doc-1");
        assert_eq!(value["import_request"], true);
        assert_eq!(value["description"]["participant_inn"], "7700000000");
        assert_eq!(value["products"][0]["tnved_code"], "6401");
        assert_eq!(value["products"][0]["uitu_code"], "");
    }

    #[test]
    fn it_reads_back_what_it_writes() {
        let document = sample();
        let pretty = serialize_pretty(&document).unwrap();
        assert_eq!(deserialize(pretty.as_bytes()).unwrap(), document);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let document = deserialize(br#"{"doc_id":"x","products":[{}]}"#).unwrap();
        assert_eq!(document.doc_id, "x");
        assert!(!document.import_request);
        assert_eq!(document.products, vec![Product::default()]);
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(deserialize(b"{not json").is_err());
    }
}
