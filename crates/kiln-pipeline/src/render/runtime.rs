//! The module runtime shipped in the manifest chunk.

use indexmap::IndexMap;

/// Global array chunks push themselves onto.
pub const CHUNK_QUEUE: &str = "self.kilnChunks";

const CHUNK_URLS_SLOT: &str = "__KILN_CHUNK_URLS__";

const RUNTIME: &str = r#"(function () {
  var modules = {};
  var cache = {};
  var installed = {};
  var deferred = [];
  var chunkUrls = __KILN_CHUNK_URLS__;

  function require(id) {
    if (cache[id]) return cache[id].exports;
    if (!modules[id]) throw new Error("Module '" + id + "' is not loaded");
    var module = (cache[id] = { exports: {} });
    modules[id].call(module.exports, module, module.exports, require);
    return module.exports;
  }

  require.n = function (m) { return m && m.__esModule ? m["default"] : m; };
  require.r = function (target, m) {
    for (var key in m) if (key !== "default" && !(key in target)) target[key] = m[key];
  };
  require.x = function (specifier) { throw new Error("Cannot find module '" + specifier + "'"); };
  require.css = function (text) {
    var el = document.createElement("style");
    el.textContent = text;
    document.head.appendChild(el);
  };

  function loadChunk(id) {
    if (installed[id] === 0) return Promise.resolve();
    if (installed[id]) return installed[id].promise;
    var pending = {};
    pending.promise = new Promise(function (resolve, reject) {
      pending.resolve = resolve;
      pending.reject = reject;
    });
    installed[id] = pending;
    var script = document.createElement("script");
    script.src = chunkUrls[id];
    script.onerror = function () {
      delete installed[id];
      pending.reject(new Error("Loading chunk " + id + " failed"));
    };
    document.head.appendChild(script);
    return pending.promise;
  }
  require.load = function (ids) { return Promise.all(ids.map(loadChunk)); };

  function flush() {
    for (var i = 0; i < deferred.length; i++) {
      var entry = deferred[i];
      var ready = true;
      for (var j = 1; j < entry.length; j++) if (installed[entry[j]] !== 0) ready = false;
      if (ready) {
        deferred.splice(i--, 1);
        require(entry[0]);
      }
    }
  }

  function install(data) {
    var ids = data[0];
    var more = data[1];
    for (var key in more) modules[key] = more[key];
    for (var i = 0; i < ids.length; i++) {
      var pending = installed[ids[i]];
      installed[ids[i]] = 0;
      if (pending && pending.resolve) pending.resolve();
    }
    if (data[2]) deferred.push.apply(deferred, data[2]);
    flush();
  }

  var queue = (self.kilnChunks = self.kilnChunks || []);
  for (var q = 0; q < queue.length; q++) install(queue[q]);
  queue.push = install;
})();
"#;

/// Runtime source with the chunk id to URL table filled in.
pub fn render_runtime(chunk_urls: &IndexMap<String, String>) -> String {
    let table = serde_json::to_string(chunk_urls).unwrap_or_else(|_| "{}".to_string());
    RUNTIME.replacen(CHUNK_URLS_SLOT, &table, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_chunk_table() {
        let mut urls = IndexMap::new();
        urls.insert("3f2a".to_string(), "/static/js/3f2a.abc.js".to_string());
        let runtime = render_runtime(&urls);
        assert!(runtime.contains(r#"var chunkUrls = {"3f2a":"/static/js/3f2a.abc.js"};"#));
        assert!(!runtime.contains(CHUNK_URLS_SLOT));
    }
}
