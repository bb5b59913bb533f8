//! Entry-point script shims
//!
//! Wheels declare executables as `name = module:attr` entry points instead
//! of shipping scripts. The shims are regenerated here, in name order, so a
//! given set of entry points always produces the same files.

use crate::layer::LayerEntry;
use crate::resolver::wheel::InstallLayout;
use std::collections::BTreeMap;
use tracing::warn;

/// A parsed `module:attr` entry point target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// Module to import
    pub module: String,
    /// Callable inside the module, possibly dotted
    pub attr: String,
}

impl EntryPoint {
    /// Parse `module:attr [extras]`; `None` when there is no callable
    pub fn parse(target: &str) -> Option<Self> {
        let target = match target.find('[') {
            Some(bracket) => &target[..bracket],
            None => target,
        };
        let (module, attr) = target.split_once(':')?;
        let module = module.trim();
        let attr = attr.trim();
        if module.is_empty() || attr.is_empty() {
            return None;
        }
        Some(Self {
            module: module.to_string(),
            attr: attr.to_string(),
        })
    }

    /// Render the shim executing this entry point
    pub fn render(&self, interpreter: &str) -> String {
        let import_name = self.attr.split('.').next().unwrap_or(&self.attr);
        format!(
            "#!{interpreter}\n\
             # -*- coding: utf-8 -*-\n\
             import re\n\
             import sys\n\
             \n\
             from {module} import {import_name}\n\
             \n\
             if __name__ == \"__main__\":\n    \
             sys.argv[0] = re.sub(r\"(-script\\.pyw|\\.exe)?$\", \"\", sys.argv[0])\n    \
             sys.exit({call}())\n",
            interpreter = interpreter,
            module = self.module,
            import_name = import_name,
            call = self.attr,
        )
    }
}

fn valid_script_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Executable shim entries for `scripts`, ordered by script name
pub fn shim_entries(scripts: &BTreeMap<String, String>, layout: &InstallLayout) -> Vec<LayerEntry> {
    let bin_dir = layout.bin_dir.trim_matches('/');
    scripts
        .iter()
        .filter_map(|(name, target)| {
            if !valid_script_name(name) {
                warn!("Skipping entry point with invalid name {:?}", name);
                return None;
            }
            let Some(entry_point) = EntryPoint::parse(target) else {
                warn!("Skipping entry point {} with invalid target {:?}", name, target);
                return None;
            };
            Some(LayerEntry::executable(
                format!("{}/{}", bin_dir, name),
                entry_point.render(&layout.interpreter),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::EXECUTABLE_MODE;

    fn layout() -> InstallLayout {
        InstallLayout {
            site_packages: "usr/local/lib/python3/site-packages".to_string(),
            bin_dir: "usr/local/bin".to_string(),
            interpreter: "/usr/bin/env python3".to_string(),
        }
    }

    #[test]
    fn parse_plain_target() {
        assert_eq!(
            EntryPoint::parse("flask.cli:main"),
            Some(EntryPoint {
                module: "flask.cli".to_string(),
                attr: "main".to_string()
            })
        );
    }

    #[test]
    fn parse_strips_extras() {
        let ep = EntryPoint::parse("pkg.mod:Cls.run [cli, fast]").unwrap();
        assert_eq!(ep.module, "pkg.mod");
        assert_eq!(ep.attr, "Cls.run");
    }

    #[test]
    fn parse_rejects_module_only() {
        assert_eq!(EntryPoint::parse("pkg.mod"), None);
        assert_eq!(EntryPoint::parse(":main"), None);
    }

    #[test]
    fn shims_ordered_by_name() {
        let mut scripts = BTreeMap::new();
        scripts.insert("b".to_string(), "pkg.b:main".to_string());
        scripts.insert("a".to_string(), "pkg.a:main".to_string());

        let entries = shim_entries(&scripts, &layout());
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["usr/local/bin/a", "usr/local/bin/b"]);
        assert!(entries.iter().all(|e| e.mode == EXECUTABLE_MODE));
    }

    #[test]
    fn shim_embeds_module_and_callable() {
        let ep = EntryPoint::parse("pkg.mod:Cls.run").unwrap();
        let shim = ep.render("/usr/bin/env python3");

        assert!(shim.starts_with("#!/usr/bin/env python3\n"));
        assert!(shim.contains("from pkg.mod import Cls\n"));
        assert!(shim.contains("    sys.exit(Cls.run())\n"));
        assert!(shim.contains("if __name__ == \"__main__\":\n"));
    }

    #[test]
    fn shims_are_deterministic() {
        let scripts: BTreeMap<String, String> = [("tool", "t:main"), ("aux", "a:main")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(shim_entries(&scripts, &layout()), shim_entries(&scripts, &layout()));
    }

    #[test]
    fn invalid_entries_skipped() {
        let mut scripts = BTreeMap::new();
        scripts.insert("../escape".to_string(), "pkg:main".to_string());
        scripts.insert("nocall".to_string(), "pkg".to_string());
        scripts.insert("ok".to_string(), "pkg:main".to_string());

        let entries = shim_entries(&scripts, &layout());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "usr/local/bin/ok");
    }
}
