//! Node serializer
//!
//! Both external forms (JSON text and native record arrays) are produced
//! from [`to_records`], so they always carry the same tuples in the same
//! order.

use crate::error::{GeneratorError, Result};
use crate::node::TypeTreeNode;
use serde::{Deserialize, Serialize};

/// Fixed-arity record handed to consumers
#[allow(non_snake_case)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Display type
    pub m_Type: String,
    /// Field name
    pub m_Name: String,
    /// Depth from the root
    pub m_Level: i32,
    /// Meta flag bits
    pub m_MetaFlag: i32,
}

impl From<&TypeTreeNode> for NodeRecord {
    fn from(node: &TypeTreeNode) -> Self {
        Self {
            m_Type: node.type_name.clone(),
            m_Name: node.name.clone(),
            m_Level: node.level,
            m_MetaFlag: node.meta_flag,
        }
    }
}

/// Convert nodes to records
pub fn to_records(nodes: &[TypeTreeNode]) -> Vec<NodeRecord> {
    nodes.iter().map(NodeRecord::from).collect()
}

/// Serialize nodes as a JSON array of records
pub fn to_json(nodes: &[TypeTreeNode]) -> Result<String> {
    serde_json::to_string(&to_records(nodes))
        .map_err(|e| GeneratorError::AllocationFailure(format!("JSON serialization failed: {}", e)))
}

/// Parse a JSON array of records
pub fn from_json(json: &str) -> Result<Vec<NodeRecord>> {
    serde_json::from_str(json)
        .map_err(|e| GeneratorError::InvalidArgument(format!("invalid node JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes() -> Vec<TypeTreeNode> {
        vec![
            TypeTreeNode::new("MonoBehaviour", "Base", 0, 0, -1),
            TypeTreeNode::new("string", "title", 1, 0x4000_4000, -1),
        ]
    }

    #[test]
    fn test_json_key_order() {
        let json = to_json(&nodes()).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"[{"m_Type":"MonoBehaviour","m_Name":"Base","m_Level":0,"m_MetaFlag":0},"#,
                r#"{"m_Type":"string","m_Name":"title","m_Level":1,"m_MetaFlag":1073758208}]"#
            )
        );
    }

    #[test]
    fn test_json_matches_records() {
        let nodes = nodes();
        let parsed = from_json(&to_json(&nodes).unwrap()).unwrap();
        assert_eq!(parsed, to_records(&nodes));
    }

    #[test]
    fn test_from_json_rejects_wrong_shape() {
        assert!(from_json(r#"[{"m_Type":"int"}]"#).is_err());
        assert!(from_json("{}").is_err());
    }
}
