use std::collections::{BTreeSet, HashMap, VecDeque};

use shared::{EngineError, SkillNode};

/// Checks that the prerequisite graph is a DAG and that every prerequisite
/// resolves to a node in the catalog. Runs at authoring/seed time so the
/// unlock cascade can walk edges without cycle guards.
pub fn validate_graph(catalog: &[SkillNode]) -> Result<(), EngineError> {
    let by_id: HashMap<&str, &SkillNode> = catalog
        .iter()
        .map(|node| (node.id.as_str(), node))
        .collect();

    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for node in catalog {
        in_degree.entry(node.id.as_str()).or_insert(0);
        // Duplicate prerequisite entries count once.
        let distinct: BTreeSet<&str> = node.prerequisites.iter().map(String::as_str).collect();
        for prerequisite in distinct {
            if !by_id.contains_key(prerequisite) {
                return Err(EngineError::UnknownPrerequisite {
                    node: node.id.clone(),
                    prerequisite: prerequisite.to_string(),
                });
            }
            *in_degree.entry(node.id.as_str()).or_insert(0) += 1;
        }
    }

    // Kahn's algorithm: peel nodes with no unresolved prerequisites.
    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut resolved = 0usize;

    while let Some(id) = queue.pop_front() {
        resolved += 1;
        for node in catalog {
            if !node.has_prerequisite(id) {
                continue;
            }
            if let Some(degree) = in_degree.get_mut(node.id.as_str()) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(node.id.as_str());
                }
            }
        }
    }

    if resolved == catalog.len() {
        Ok(())
    } else {
        // Any node still carrying unresolved prerequisites sits on a cycle.
        let on_cycle = in_degree
            .iter()
            .find(|(_, degree)| **degree > 0)
            .map(|(id, _)| id.to_string())
            .unwrap_or_default();
        Err(EngineError::CyclicPrerequisites(on_cycle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, prerequisites: &[&str]) -> SkillNode {
        SkillNode::new(id, id, "math")
            .with_prerequisites(prerequisites.iter().map(|p| p.to_string()).collect())
    }

    #[test]
    fn accepts_a_dag() {
        let catalog = vec![
            node("a", &[]),
            node("b", &["a"]),
            node("c", &["a", "b"]),
            node("d", &["c"]),
        ];
        assert!(validate_graph(&catalog).is_ok());
    }

    #[test]
    fn rejects_a_cycle() {
        let catalog = vec![node("a", &["c"]), node("b", &["a"]), node("c", &["b"])];
        assert!(matches!(
            validate_graph(&catalog),
            Err(EngineError::CyclicPrerequisites(_))
        ));
    }

    #[test]
    fn rejects_a_self_loop() {
        let catalog = vec![node("a", &["a"])];
        assert!(matches!(
            validate_graph(&catalog),
            Err(EngineError::CyclicPrerequisites(_))
        ));
    }

    #[test]
    fn rejects_unknown_prerequisites() {
        let catalog = vec![node("a", &[]), node("b", &["ghost"])];
        assert!(matches!(
            validate_graph(&catalog),
            Err(EngineError::UnknownPrerequisite { .. })
        ));
    }

    #[test]
    fn accepts_an_empty_catalog() {
        assert!(validate_graph(&[]).is_ok());
    }
}
