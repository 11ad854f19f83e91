use std::collections::HashSet;

use handmouse::config::Settings;

const THIRDPARTY_DIR: &str = "3rdparty";

/// Returns the paths listed in the attribution table of `3rdparty/README.md`.
fn attributed_paths() -> HashSet<String> {
    let file = std::fs::read_to_string(format!("{}/README.md", THIRDPARTY_DIR)).unwrap();

    let mut present = HashSet::new();
    let mut in_table = false;
    for line in file.lines() {
        if in_table {
            if line.starts_with('|') {
                let rest = &line[line.find('`').unwrap() + 1..];
                let path = &rest[..rest.find('`').unwrap()];
                present.insert(path.to_string());
            } else {
                break;
            }
        } else if line.starts_with("|---") {
            in_table = true;
        }
    }
    present
}

fn assert_attributed(model: &std::path::Path) {
    let model = model.to_str().unwrap();
    let model = model
        .strip_prefix(THIRDPARTY_DIR)
        .and_then(|path| path.strip_prefix('/'))
        .unwrap_or_else(|| panic!("default model `{}` is not in `{}`", model, THIRDPARTY_DIR));

    let present = attributed_paths();
    assert!(
        present.contains(model),
        "default model `{}` is not attributed in readme (found {:?})",
        model,
        present
    );
}

#[test]
fn default_models_are_attributed() {
    let settings = Settings::default();
    assert_attributed(settings.model());
    assert_attributed(settings.palm_model());
}
