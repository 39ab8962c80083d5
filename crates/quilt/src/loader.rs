//! Bundle assembly
//!
//! The artifact is a self-executing wrapper that installs a `require`-style
//! loader under a configurable global binding (only when that binding is not
//! already present) and then hands the module factories of this bundle to the
//! loader's `define`. Evaluating several bundles in one global scope therefore
//! merges their modules under a single loader.
//!
//! The resolution algorithm embedded here is mirrored by [`crate::runtime`].

use log::debug;

use crate::sources::ModuleMap;

const PREAMBLE: &str = r#"(function(/*! quilt !*/) {
  if (!this[IDENTIFIER]) {
    var modules = {}, cache = {};
    var expand = function(root, name) {
      var results = [], parts, part;
      if (/^\.\.?(\/|$)/.test(name)) {
        parts = [root, name].join('/').split('/');
      } else {
        parts = name.split('/');
      }
      for (var i = 0, length = parts.length; i < length; i++) {
        part = parts[i];
        if (part == '..') {
          results.pop();
        } else if (part != '.' && part != '') {
          results.push(part);
        }
      }
      return results.join('/');
    };
    var dirname = function(path) {
      return path.split('/').slice(0, -1).join('/');
    };
    var require = function(name, root) {
      var path = expand(root, name), module = cache[path], fn = modules[path];
      if (module) {
        return module.exports;
      }
      if (!fn) {
        path = expand(path, './index');
        if (cache[path]) {
          return cache[path].exports;
        }
        fn = modules[path];
      }
      if (!fn) {
        throw new Error("module '" + name + "' not found");
      }
      module = cache[path] = {id: path, exports: {}};
      try {
        fn(module.exports, function(name) {
          return require(name, dirname(path));
        }, module);
        return module.exports;
      } catch (err) {
        delete cache[path];
        throw err;
      }
    };
    this[IDENTIFIER] = function(name) {
      return require(name, '');
    };
    this[IDENTIFIER].define = function(bundle) {
      for (var key in bundle) {
        modules[key] = bundle[key];
      }
    };
  }
  return this[IDENTIFIER].define;
}).call(typeof globalThis !== 'undefined' ? globalThis : this)"#;

/// Loader preamble bound to `identifier`
pub fn render_preamble(identifier: &str) -> String {
    PREAMBLE.replace("IDENTIFIER", &js_string(identifier))
}

/// Object literal mapping each module name to its factory, in map order.
/// Bodies sit on their own lines so a trailing line comment cannot swallow
/// the closing brace.
pub fn render_definitions(modules: &ModuleMap) -> String {
    let entries: Vec<String> = modules
        .iter()
        .map(|(name, module)| {
            format!(
                "{}: function(exports, require, module) {{\n{}\n}}",
                js_string(name),
                module.source
            )
        })
        .collect();
    format!("{{{}}}", entries.join(", "))
}

/// Full loader plus definitions for one bundle
pub fn assemble(identifier: &str, modules: &ModuleMap) -> String {
    debug!(
        "Assembling {} modules under global '{identifier}'",
        modules.len()
    );
    format!(
        "{}({});\n",
        render_preamble(identifier),
        render_definitions(modules)
    )
}

fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}
