//! Generates the C preload shim that registers every bundled module as a
//! `package.preload` entry inside the statically linked interpreter. Each
//! module's `luaopen_<module>` symbol is registered into a compile-time C
//! table, since the static bundle has no host `Lua` value to register into
//! at build time.

/// One C symbol to register: the dotted module name and the C function
/// name that implements its `luaopen_*` entry point.
pub struct PreloadModule {
    pub dotted_name: String,
    pub luaopen_symbol: String,
}

impl PreloadModule {
    pub fn new(dotted_name: impl Into<String>) -> Self {
        let dotted_name = dotted_name.into();
        let luaopen_symbol = format!("luaopen_{}", dotted_name.replace('.', "_"));
        Self { dotted_name, luaopen_symbol }
    }
}

/// Renders `ldist_preload.c`: forward declarations for each module's
/// `luaopen_*` entry point, a `luaL_Reg` table pairing dotted names to
/// those entry points, and a single `ldist_preload_all(lua_State *L)`
/// function that registers the table into `package.preload`.
pub fn generate_shim(modules: &[PreloadModule]) -> String {
    let mut out = String::from(
        "/* generated preload shim: registers every statically linked module\n * into package.preload before the host script runs. */\n#include \"lua.h\"\n#include \"lauxlib.h\"\n#include \"lualib.h\"\n\n",
    );

    for module in modules {
        out.push_str(&format!("int {}(lua_State *L);\n", module.luaopen_symbol));
    }
    out.push('\n');

    out.push_str("static const luaL_Reg ldist_preload_modules[] = {\n");
    for module in modules {
        out.push_str(&format!(
            "  {{\"{}\", {}}},\n",
            module.dotted_name, module.luaopen_symbol
        ));
    }
    out.push_str("  {NULL, NULL}\n};\n\n");

    out.push_str(
        "void ldist_preload_all(lua_State *L) {\n  lua_getglobal(L, \"package\");\n  lua_getfield(L, -1, \"preload\");\n  for (const luaL_Reg *m = ldist_preload_modules; m->name != NULL; m++) {\n    lua_pushcfunction(L, m->func);\n    lua_setfield(L, -2, m->name);\n  }\n  lua_pop(L, 2);\n}\n",
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luaopen_symbol_replaces_dots_with_underscores() {
        let module = PreloadModule::new("foo.bar");
        assert_eq!(module.luaopen_symbol, "luaopen_foo_bar");
    }

    #[test]
    fn shim_declares_and_registers_every_module() {
        let modules = vec![PreloadModule::new("xml"), PreloadModule::new("xml.parser")];
        let shim = generate_shim(&modules);
        assert!(shim.contains("int luaopen_xml(lua_State *L);"));
        assert!(shim.contains("int luaopen_xml_parser(lua_State *L);"));
        assert!(shim.contains("{\"xml\", luaopen_xml}"));
        assert!(shim.contains("{\"xml.parser\", luaopen_xml_parser}"));
        assert!(shim.contains("ldist_preload_all"));
    }

    #[test]
    fn empty_module_list_still_produces_a_valid_shim() {
        let shim = generate_shim(&[]);
        assert!(shim.contains("{NULL, NULL}"));
    }
}
