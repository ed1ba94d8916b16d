//! Builtin function signatures and documentation for completion and hover.
//!
//! One static table, sorted by name so lookup is a binary search. Snippets
//! use LSP snippet placeholder syntax and are only offered to clients that
//! negotiated snippet support.

#![deny(unsafe_code)]

/// One `@`-builtin: signature, snippet insert text, and documentation.
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    /// Name including the leading `@`.
    pub name: &'static str,
    pub signature: &'static str,
    pub snippet: &'static str,
    pub documentation: &'static str,
}

/// All builtins the server completes, sorted by name.
pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "@This",
        signature: "@This() type",
        snippet: "@This()",
        documentation: "Returns the innermost container type that this call is inside.",
    },
    Builtin {
        name: "@TypeOf",
        signature: "@TypeOf(...) type",
        snippet: "@TypeOf(${1:value})",
        documentation: "Returns the type of the operand, evaluated at compile time without side effects.",
    },
    Builtin {
        name: "@addWithOverflow",
        signature: "@addWithOverflow(a: anytype, b: anytype) struct { @TypeOf(a, b), u1 }",
        snippet: "@addWithOverflow(${1:a}, ${2:b})",
        documentation: "Wrapping addition that also returns an overflow bit.",
    },
    Builtin {
        name: "@alignOf",
        signature: "@alignOf(comptime T: type) comptime_int",
        snippet: "@alignOf(${1:T})",
        documentation: "Returns the ABI alignment of the given type in bytes.",
    },
    Builtin {
        name: "@as",
        signature: "@as(comptime T: type, expression) T",
        snippet: "@as(${1:T}, ${2:expression})",
        documentation: "Performs a type coercion; the preferred way to convert between types when unambiguous.",
    },
    Builtin {
        name: "@bitCast",
        signature: "@bitCast(value: anytype) anytype",
        snippet: "@bitCast(${1:value})",
        documentation: "Reinterprets the bits of a value as the inferred result type, preserving the bit pattern.",
    },
    Builtin {
        name: "@bitSizeOf",
        signature: "@bitSizeOf(comptime T: type) comptime_int",
        snippet: "@bitSizeOf(${1:T})",
        documentation: "Returns the number of bits it takes to store the type in memory.",
    },
    Builtin {
        name: "@breakpoint",
        signature: "@breakpoint() void",
        snippet: "@breakpoint()",
        documentation: "Inserts a platform-specific debug trap instruction.",
    },
    Builtin {
        name: "@compileError",
        signature: "@compileError(comptime msg: []const u8) noreturn",
        snippet: "@compileError(\"${1:message}\")",
        documentation: "Emits a compile error with the given message when the call is semantically analyzed.",
    },
    Builtin {
        name: "@compileLog",
        signature: "@compileLog(...) void",
        snippet: "@compileLog(${1:value})",
        documentation: "Prints the arguments at compile time and forces a compile error.",
    },
    Builtin {
        name: "@divExact",
        signature: "@divExact(numerator: T, denominator: T) T",
        snippet: "@divExact(${1:numerator}, ${2:denominator})",
        documentation: "Exact division; illegal behavior if a remainder would be produced.",
    },
    Builtin {
        name: "@divFloor",
        signature: "@divFloor(numerator: T, denominator: T) T",
        snippet: "@divFloor(${1:numerator}, ${2:denominator})",
        documentation: "Floored division, rounding toward negative infinity.",
    },
    Builtin {
        name: "@divTrunc",
        signature: "@divTrunc(numerator: T, denominator: T) T",
        snippet: "@divTrunc(${1:numerator}, ${2:denominator})",
        documentation: "Truncated division, rounding toward zero.",
    },
    Builtin {
        name: "@embedFile",
        signature: "@embedFile(comptime path: []const u8) *const [N:0]u8",
        snippet: "@embedFile(\"${1:path}\")",
        documentation: "Embeds the contents of a file as a compile-time constant string.",
    },
    Builtin {
        name: "@enumFromInt",
        signature: "@enumFromInt(integer: anytype) @TypeOf(result)",
        snippet: "@enumFromInt(${1:integer})",
        documentation: "Converts an integer into an enum value of the inferred result type.",
    },
    Builtin {
        name: "@errorFromInt",
        signature: "@errorFromInt(value: u16) anyerror",
        snippet: "@errorFromInt(${1:value})",
        documentation: "Converts an integer to the global error set value with that numeric id.",
    },
    Builtin {
        name: "@errorName",
        signature: "@errorName(err: anyerror) [:0]const u8",
        snippet: "@errorName(${1:err})",
        documentation: "Returns the string name of an error value.",
    },
    Builtin {
        name: "@fieldParentPtr",
        signature: "@fieldParentPtr(comptime field_name: []const u8, field_ptr: *T) *ParentType",
        snippet: "@fieldParentPtr(\"${1:field_name}\", ${2:field_ptr})",
        documentation: "Given a pointer to a field, returns a pointer to the struct containing it.",
    },
    Builtin {
        name: "@hasDecl",
        signature: "@hasDecl(comptime Container: type, comptime name: []const u8) bool",
        snippet: "@hasDecl(${1:Container}, \"${2:name}\")",
        documentation: "Whether the container has a declaration with the given name.",
    },
    Builtin {
        name: "@hasField",
        signature: "@hasField(comptime Container: type, comptime name: []const u8) bool",
        snippet: "@hasField(${1:Container}, \"${2:name}\")",
        documentation: "Whether the struct, union, or enum has a field with the given name.",
    },
    Builtin {
        name: "@import",
        signature: "@import(comptime path: []const u8) type",
        snippet: "@import(\"${1:path}\")",
        documentation: "Imports a source file or package root and returns it as a struct type.",
    },
    Builtin {
        name: "@intCast",
        signature: "@intCast(integer: anytype) anytype",
        snippet: "@intCast(${1:integer})",
        documentation: "Converts between integer types, asserting the value fits in the destination.",
    },
    Builtin {
        name: "@intFromEnum",
        signature: "@intFromEnum(enum_or_tagged_union: anytype) anytype",
        snippet: "@intFromEnum(${1:value})",
        documentation: "Returns the integer tag value of an enum or tagged union.",
    },
    Builtin {
        name: "@intFromError",
        signature: "@intFromError(err: anyerror) u16",
        snippet: "@intFromError(${1:err})",
        documentation: "Returns the numeric id of an error in the global error set.",
    },
    Builtin {
        name: "@intFromFloat",
        signature: "@intFromFloat(float: anytype) anytype",
        snippet: "@intFromFloat(${1:float})",
        documentation: "Converts the integer part of a float to the inferred integer type.",
    },
    Builtin {
        name: "@intFromPtr",
        signature: "@intFromPtr(value: anytype) usize",
        snippet: "@intFromPtr(${1:value})",
        documentation: "Converts a pointer to its address as a usize.",
    },
    Builtin {
        name: "@max",
        signature: "@max(a: T, b: T) T",
        snippet: "@max(${1:a}, ${2:b})",
        documentation: "Returns the maximum of the operands.",
    },
    Builtin {
        name: "@memcpy",
        signature: "@memcpy(noalias dest, noalias source) void",
        snippet: "@memcpy(${1:dest}, ${2:source})",
        documentation: "Copies bytes from one region of memory to another.",
    },
    Builtin {
        name: "@memset",
        signature: "@memset(dest, elem) void",
        snippet: "@memset(${1:dest}, ${2:elem})",
        documentation: "Sets all elements of a slice to the given value.",
    },
    Builtin {
        name: "@min",
        signature: "@min(a: T, b: T) T",
        snippet: "@min(${1:a}, ${2:b})",
        documentation: "Returns the minimum of the operands.",
    },
    Builtin {
        name: "@mod",
        signature: "@mod(numerator: T, denominator: T) T",
        snippet: "@mod(${1:numerator}, ${2:denominator})",
        documentation: "Modulus division; the result has the same sign as the denominator.",
    },
    Builtin {
        name: "@panic",
        signature: "@panic(message: []const u8) noreturn",
        snippet: "@panic(\"${1:message}\")",
        documentation: "Invokes the panic handler with the given message.",
    },
    Builtin {
        name: "@ptrCast",
        signature: "@ptrCast(value: anytype) anytype",
        snippet: "@ptrCast(${1:value})",
        documentation: "Converts between pointer types, preserving the address.",
    },
    Builtin {
        name: "@ptrFromInt",
        signature: "@ptrFromInt(address: usize) anytype",
        snippet: "@ptrFromInt(${1:address})",
        documentation: "Converts an address to a pointer of the inferred type.",
    },
    Builtin {
        name: "@rem",
        signature: "@rem(numerator: T, denominator: T) T",
        snippet: "@rem(${1:numerator}, ${2:denominator})",
        documentation: "Remainder division; the result has the same sign as the numerator.",
    },
    Builtin {
        name: "@sizeOf",
        signature: "@sizeOf(comptime T: type) comptime_int",
        snippet: "@sizeOf(${1:T})",
        documentation: "Returns the number of bytes it takes to store the type in memory.",
    },
    Builtin {
        name: "@sqrt",
        signature: "@sqrt(value: anytype) @TypeOf(value)",
        snippet: "@sqrt(${1:value})",
        documentation: "Square root of a floating point number.",
    },
    Builtin {
        name: "@tagName",
        signature: "@tagName(value: anytype) [:0]const u8",
        snippet: "@tagName(${1:value})",
        documentation: "Converts an enum or tagged union value to the string name of its tag.",
    },
    Builtin {
        name: "@truncate",
        signature: "@truncate(integer: anytype) anytype",
        snippet: "@truncate(${1:integer})",
        documentation: "Truncates bits from an integer to fit the inferred smaller type.",
    },
    Builtin {
        name: "@typeInfo",
        signature: "@typeInfo(comptime T: type) std.builtin.Type",
        snippet: "@typeInfo(${1:T})",
        documentation: "Provides reflection: returns a tagged union describing the type.",
    },
    Builtin {
        name: "@typeName",
        signature: "@typeName(T: type) *const [N:0]u8",
        snippet: "@typeName(${1:T})",
        documentation: "Returns the string representation of a type name.",
    },
];

/// Find a builtin by its full name, `@` included.
pub fn find(name: &str) -> Option<&'static Builtin> {
    BUILTINS
        .binary_search_by(|b| b.name.cmp(name))
        .ok()
        .map(|i| &BUILTINS[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn table_is_sorted_by_name() {
        for pair in BUILTINS.windows(2) {
            assert!(pair[0].name < pair[1].name, "{} >= {}", pair[0].name, pair[1].name);
        }
    }

    #[test]
    fn find_known_builtin() {
        let import = find("@import").unwrap();
        assert_eq!(import.signature, "@import(comptime path: []const u8) type");
        assert!(find("@nope").is_none());
    }

    #[test]
    fn every_entry_is_well_formed() {
        for b in BUILTINS {
            assert!(b.name.starts_with('@'));
            assert!(b.signature.starts_with(b.name));
            assert!(b.snippet.starts_with(b.name));
            assert!(!b.documentation.is_empty());
        }
    }
}
