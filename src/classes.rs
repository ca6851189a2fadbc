/// Land-cover classes of the Salinas ground truth, label `i + 1` at index `i`.
pub const SALINAS_CLASSES: [&str; 16] = [
    "Brocoli_green_weeds_1",
    "Brocoli_green_weeds_2",
    "Fallow",
    "Fallow_rough_plow",
    "Fallow_smooth",
    "Stubble",
    "Celery",
    "Grapes_untrained",
    "Soil_vinyard_develop",
    "Corn_senesced_green_weeds",
    "Lettuce_romaine_4wk",
    "Lettuce_romaine_5wk",
    "Lettuce_romaine_6wk",
    "Lettuce_romaine_7wk",
    "Vinyard_untrained",
    "Vinyard_vertical_trellis",
];

/// Display name for a label: `"<label>.<name>"`.
///
/// `names` (when non-empty) replaces the Salinas table; labels past the end
/// of whichever table is in use fall back to `"class <label>"`.
pub fn class_name(label: u32, names: &[String]) -> String {
    let index = (label as usize).checked_sub(1);
    let name = match index {
        Some(i) if !names.is_empty() => names.get(i).map(String::as_str),
        Some(i) => SALINAS_CLASSES.get(i).copied(),
        None => None,
    };
    match name {
        Some(name) => format!("{label}.{name}"),
        None => format!("class {label}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salinas_names_are_label_prefixed() {
        assert_eq!(class_name(1, &[]), "1.Brocoli_green_weeds_1");
        assert_eq!(class_name(16, &[]), "16.Vinyard_vertical_trellis");
    }

    #[test]
    fn overrides_replace_the_table() {
        let names = vec!["water".to_string(), "trees".to_string()];
        assert_eq!(class_name(2, &names), "2.trees");
        assert_eq!(class_name(3, &names), "class 3");
    }

    #[test]
    fn out_of_table_labels_fall_back() {
        assert_eq!(class_name(17, &[]), "class 17");
        assert_eq!(class_name(0, &[]), "class 0");
    }
}
