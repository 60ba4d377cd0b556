//! Subcommand implementations

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use halscope_core::{
    find_property, list_properties, object_class, parse_word, query_with_input, ControlModel,
    InspectorSettings, ObjectTree, PropertyRow,
};
use halscope_hal::class::class_name;
use halscope_hal::listener::{ListenerRegistry, NotificationQueue};
use halscope_hal::properties::{ObjectProperty, PropertySet};
use halscope_hal::{four_cc_string, AudioObjectId, Hal, Property, PropertyAddress};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    fn json<T: Serialize>(self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

fn object_id(text: &str) -> Result<AudioObjectId> {
    parse_word(text).with_context(|| format!("invalid object id '{}'", text))
}

fn code(selector: u32) -> String {
    four_cc_string(selector)
        .map(|s| format!("'{}'", s))
        .unwrap_or_else(|| format!("0x{:08x}", selector))
}

pub fn tree(hal: &dyn Hal, output: Output) -> Result<()> {
    let tree = ObjectTree::load(hal);
    if output.json {
        return output.json(tree.root());
    }

    for (depth, node) in tree.flatten() {
        println!(
            "{:indent$}@{} {} [{}]",
            "",
            node.id,
            node.name,
            node.class_name,
            indent = depth * 2
        );
    }
    println!("{} objects, captured {}", tree.len(), tree.captured_at().to_rfc3339());
    Ok(())
}

fn print_rows(rows: &[PropertyRow]) {
    let mut current_set = None;
    for row in rows {
        if row.set != current_set {
            if let Some(kind) = row.set {
                println!("\n{}", kind.title());
            }
            current_set = row.set;
        }

        let flag = if row.settable { "w" } else { " " };
        let value = if row.needs_input() {
            format!("<{}>", row.semantics)
        } else {
            row.value.clone()
        };
        println!("  {} {:<40} {:<8} {}", flag, row.name, code(row.selector), value);
    }
}

pub fn props(
    hal: &dyn Hal,
    settings: &InspectorSettings,
    object: &str,
    output: Output,
) -> Result<()> {
    let object = object_id(object)?;
    if !ObjectProperty::Class.on(hal, object).exists() {
        bail!("no object @{}", object);
    }

    let rows = list_properties(hal, object, settings.scope.scope(), settings.include_deprecated);
    if output.json {
        return output.json(&rows);
    }

    let class = object_class(hal, object);
    println!("@{} ({}, scope {})", object, class_name(class), settings.scope);
    print_rows(&rows);
    Ok(())
}

fn resolve<'a>(
    hal: &'a dyn Hal,
    settings: &InspectorSettings,
    object: AudioObjectId,
    name: &str,
) -> Result<Property<'a>> {
    let class = object_class(hal, object);
    let (kind, case, descriptor) = find_property(class, name)
        .ok_or_else(|| anyhow!("{} objects have no property named '{}'", class_name(class), name))?;
    debug!("Resolved '{}' to {}::{}", name, kind.title(), case);

    Ok(Property::new(hal, object, case, descriptor)
        .scope(settings.scope.scope())
        .element(settings.element))
}

pub fn query(
    hal: &dyn Hal,
    settings: &InspectorSettings,
    object: &str,
    property: &str,
    input: &str,
    output: Output,
) -> Result<()> {
    let object = object_id(object)?;
    let property = resolve(hal, settings, object, property)?;
    let value = query_with_input(&property, input)?;

    if output.json {
        return output.json(&value);
    }
    println!("{} ({}) = {}", property.name(), input, value);
    Ok(())
}

fn print_control(model: &ControlModel) {
    println!("@{} {}", model.control(), model.name());
    match model {
        ControlModel::Slider(m) => {
            println!("  slider {} in [{}, {}]", m.value, m.range_min, m.range_max)
        }
        ControlModel::Level(m) => println!(
            "  level {:.4} ({:.2} dB, range {:.2}..{:.2} dB)",
            m.scalar, m.decibels, m.decibel_range.minimum, m.decibel_range.maximum
        ),
        ControlModel::Boolean(m) => println!("  {}", if m.value { "on" } else { "off" }),
        ControlModel::Selector(m) => {
            for item in &m.items {
                let marker = if m.current_item_ids.contains(&item.id) { "*" } else { " " };
                println!("  {} {:>4} {} ({})", marker, item.id, item.name, code(item.kind));
            }
        }
        ControlModel::StereoPan(m) => println!(
            "  pan {:.2} between channels {} and {}",
            m.value, m.left_channel, m.right_channel
        ),
    }
}

pub fn control(hal: &dyn Hal, object: &str, output: Output) -> Result<()> {
    let model = ControlModel::load(hal, object_id(object)?)?;
    if output.json {
        return output.json(&model);
    }
    print_control(&model);
    Ok(())
}

fn parse_bool(text: &str) -> Result<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "on" | "1" => Ok(true),
        "false" | "off" | "0" => Ok(false),
        other => bail!("expected true/false, got '{}'", other),
    }
}

pub fn set_control(
    hal: &dyn Hal,
    object: &str,
    value: &str,
    scalar: bool,
    output: Output,
) -> Result<()> {
    let mut model = ControlModel::load(hal, object_id(object)?)?;

    match &mut model {
        ControlModel::Slider(m) => m.set_value(hal, parse_word(value)?)?,
        ControlModel::Level(m) => {
            let number: f32 = value.parse().with_context(|| format!("invalid level '{}'", value))?;
            if scalar {
                m.set_scalar(hal, number)?
            } else {
                m.set_decibels(hal, number)?
            }
        }
        ControlModel::Boolean(m) => m.set_value(hal, parse_bool(value)?)?,
        ControlModel::Selector(m) => {
            let ids = value
                .split(',')
                .map(|item| parse_word(item.trim()))
                .collect::<Result<Vec<u32>, _>>()?;
            m.set_current_items(hal, &ids)?
        }
        ControlModel::StereoPan(m) => {
            let pan: f32 = value.parse().with_context(|| format!("invalid pan '{}'", value))?;
            m.set_value(hal, pan)?
        }
    }

    info!("Wrote '{}' to control @{}", value, model.control());
    if output.json {
        return output.json(&model);
    }
    print_control(&model);
    Ok(())
}

pub fn watch(
    hal: Arc<dyn Hal>,
    settings: &InspectorSettings,
    object: &str,
    property: &str,
    seconds: u64,
) -> Result<()> {
    let object = object_id(object)?;
    let resolved = resolve(hal.as_ref(), settings, object, property)?;
    let address = PropertyAddress::new(
        resolved.descriptor().selector,
        settings.scope.scope(),
        settings.element,
    );
    let name = resolved.name();

    let queue = NotificationQueue::new("halscope-notifications")?;
    let registry = ListenerRegistry::new(hal.clone());
    let listener = registry.add(
        object,
        address,
        Some(&queue),
        Arc::new(move |addresses: &[PropertyAddress]| {
            for changed in addresses {
                println!("@{} {} changed ({})", object, name, code(changed.selector));
            }
        }),
    )?;

    println!("Watching {} on @{} for {}s", name, object, seconds);
    thread::sleep(Duration::from_secs(seconds));

    registry.remove(&listener)?;
    Ok(())
}

pub fn settings(settings: &mut InspectorSettings, save: bool, output: Output) -> Result<()> {
    if save {
        let path = settings.save()?;
        println!("Saved to {}", path.display());
    } else if let Some(path) = InspectorSettings::config_path() {
        println!("Settings file: {}", path.display());
    }

    if output.json {
        return output.json(settings);
    }
    println!("scope: {}", settings.scope);
    println!("element: {}", settings.element);
    println!("include_deprecated: {}", settings.include_deprecated);
    println!("simulated: {}", settings.simulated);
    println!("log_filter: {}", settings.log_filter);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use halscope_hal::sim::SimulatedHal;

    #[test]
    fn test_object_id_forms() {
        assert_eq!(object_id("40").unwrap(), 40);
        assert_eq!(object_id("@41").unwrap(), 41);
        assert!(object_id("speakers").is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("On").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_set_control_writes_through() {
        let hal = SimulatedHal::demo();
        let output = Output { json: true };

        set_control(&hal, "51", "true", false, output).unwrap();
        match ControlModel::load(&hal, 51).unwrap() {
            ControlModel::Boolean(mute) => assert!(mute.value),
            other => panic!("expected boolean control, got {:?}", other),
        }

        assert!(set_control(&hal, "40", "1", false, output).is_err());
    }
}
