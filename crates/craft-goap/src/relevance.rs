use std::collections::BTreeSet;

use craft_core::{ActionDomain, StateSchema};

/// Indices of the actions that can contribute to `goal_keys`, in domain order.
///
/// Backward-chains to a fixpoint: composite facts pull in their dependencies, and any
/// action with a positive effect on a relevant key is kept and pulls in its precondition
/// keys. Actions that only ever decrease or clear relevant facts are dropped.
pub fn relevant_actions<'k>(
    goal_keys: impl IntoIterator<Item = &'k str>,
    domain: &ActionDomain,
    schema: &StateSchema,
) -> Vec<usize> {
    let mut keys: BTreeSet<String> = goal_keys.into_iter().map(str::to_string).collect();
    let mut selected = vec![false; domain.len()];

    loop {
        let mut changed = false;

        let deps: Vec<String> = keys
            .iter()
            .filter_map(|key| schema.dependencies(key))
            .flatten()
            .cloned()
            .collect();
        for dep in deps {
            changed |= keys.insert(dep);
        }

        for (idx, action) in domain.actions().iter().enumerate() {
            if selected[idx] {
                continue;
            }
            let contributes = action
                .effects
                .iter()
                .any(|(key, effect)| effect.is_positive() && keys.contains(key));
            if contributes {
                selected[idx] = true;
                changed = true;
                keys.extend(action.preconditions.keys().cloned());
            }
        }

        if !changed {
            break;
        }
    }

    selected
        .iter()
        .enumerate()
        .filter_map(|(idx, &keep)| keep.then_some(idx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use craft_core::FactSpec;

    #[test]
    fn chains_through_preconditions_and_composites() {
        let domain = ActionDomain::from_json_str(
            r#"[
                {"name": "chop", "effects": {"inventory.oak_log": "+1"}},
                {"name": "planks", "preconditions": {"inventory.oak_log": ">= 1"},
                 "effects": {"inventory.oak_log": "-1", "inventory.oak_planks": "+4"}},
                {"name": "table", "preconditions": {"inventory.oak_planks": ">= 4"},
                 "effects": {"inventory.oak_planks": "-4", "inventory.crafting_table": "+1"}},
                {"name": "pickaxe", "preconditions": {"has_workbench": true},
                 "effects": {"inventory.wooden_pickaxe": "+1"}},
                {"name": "dance", "effects": {"mood": "+1"}},
                {"name": "burn_logs", "effects": {"inventory.oak_log": "-1"}}
            ]"#,
        )
        .unwrap();
        let schema = StateSchema::new()
            .with_fact("has_workbench", FactSpec::composite(["inventory.crafting_table"]));

        let relevant = relevant_actions(["inventory.wooden_pickaxe"], &domain, &schema);
        let names: Vec<&str> = relevant
            .iter()
            .map(|&i| domain.actions()[i].name.as_str())
            .collect();
        assert_eq!(names, vec!["chop", "planks", "table", "pickaxe"]);
    }
}
