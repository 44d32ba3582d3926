//! JVM class file writer
//!
//! Emits class file version 50.0. Bodies are straight-line code, so no
//! `StackMapTable` is written; `max_stack` is tracked as instructions are
//! emitted and `max_locals` is reserved by the caller.

use rustc_hash::FxHashMap;

use super::type_mapper::{JvmType, Sort};
use super::CodegenError;

pub const MAGIC: u32 = 0xCAFE_BABE;
pub const MAJOR_VERSION: u16 = 50;
pub const MINOR_VERSION: u16 = 0;

/// Access and property flags.
pub mod access {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const SUPER: u16 = 0x0020;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
    pub const ENUM: u16 = 0x4000;
}

/// Opcodes used by the generator.
pub mod opcodes {
    pub const ACONST_NULL: u8 = 0x01;
    pub const ICONST_M1: u8 = 0x02;
    pub const ICONST_0: u8 = 0x03;
    pub const LCONST_0: u8 = 0x09;
    pub const FCONST_0: u8 = 0x0b;
    pub const DCONST_0: u8 = 0x0e;
    pub const BIPUSH: u8 = 0x10;
    pub const SIPUSH: u8 = 0x11;
    pub const LDC: u8 = 0x12;
    pub const LDC_W: u8 = 0x13;
    pub const LDC2_W: u8 = 0x14;
    pub const ILOAD: u8 = 0x15;
    pub const LLOAD: u8 = 0x16;
    pub const FLOAD: u8 = 0x17;
    pub const DLOAD: u8 = 0x18;
    pub const ALOAD: u8 = 0x19;
    pub const ISTORE: u8 = 0x36;
    pub const LSTORE: u8 = 0x37;
    pub const FSTORE: u8 = 0x38;
    pub const DSTORE: u8 = 0x39;
    pub const ASTORE: u8 = 0x3a;
    pub const IASTORE: u8 = 0x4f;
    pub const LASTORE: u8 = 0x50;
    pub const FASTORE: u8 = 0x51;
    pub const DASTORE: u8 = 0x52;
    pub const AASTORE: u8 = 0x53;
    pub const BASTORE: u8 = 0x54;
    pub const CASTORE: u8 = 0x55;
    pub const SASTORE: u8 = 0x56;
    pub const POP: u8 = 0x57;
    pub const POP2: u8 = 0x58;
    pub const DUP: u8 = 0x59;
    pub const I2L: u8 = 0x85;
    pub const I2B: u8 = 0x91;
    pub const I2S: u8 = 0x93;
    pub const IRETURN: u8 = 0xac;
    pub const LRETURN: u8 = 0xad;
    pub const FRETURN: u8 = 0xae;
    pub const DRETURN: u8 = 0xaf;
    pub const ARETURN: u8 = 0xb0;
    pub const RETURN: u8 = 0xb1;
    pub const GETSTATIC: u8 = 0xb2;
    pub const PUTSTATIC: u8 = 0xb3;
    pub const GETFIELD: u8 = 0xb4;
    pub const PUTFIELD: u8 = 0xb5;
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEINTERFACE: u8 = 0xb9;
    pub const NEW: u8 = 0xbb;
    pub const NEWARRAY: u8 = 0xbc;
    pub const ANEWARRAY: u8 = 0xbd;
    pub const CHECKCAST: u8 = 0xc0;
    pub const WIDE: u8 = 0xc4;
}

use opcodes::*;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Constant {
    Utf8(String),
    Integer(i32),
    Long(i64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
}

impl Constant {
    /// Number of pool slots the constant occupies.
    fn width(&self) -> u32 {
        match self {
            Constant::Long(_) => 2,
            _ => 1,
        }
    }
}

/// Deduplicating constant pool.
#[derive(Debug, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    index: FxHashMap<Constant, u16>,
    /// Next free index; slot 0 is unused
    next: u32,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self {
            next: 1,
            ..Self::default()
        }
    }

    fn add(&mut self, constant: Constant) -> u16 {
        if let Some(&index) = self.index.get(&constant) {
            return index;
        }
        // Overflow is reported by `ClassWriter::to_bytes`
        let index = self.next.min(u16::MAX as u32) as u16;
        self.next += constant.width();
        self.index.insert(constant.clone(), index);
        self.entries.push(constant);
        index
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        self.add(Constant::Utf8(text.to_string()))
    }

    pub fn class(&mut self, internal_name: &str) -> u16 {
        let name = self.utf8(internal_name);
        self.add(Constant::Class(name))
    }

    pub fn string(&mut self, text: &str) -> u16 {
        let utf8 = self.utf8(text);
        self.add(Constant::String(utf8))
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        self.add(Constant::Integer(value))
    }

    pub fn long(&mut self, value: i64) -> u16 {
        self.add(Constant::Long(value))
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.add(Constant::NameAndType(name, descriptor))
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let nat = self.name_and_type(name, descriptor);
        self.add(Constant::FieldRef(class, nat))
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let nat = self.name_and_type(name, descriptor);
        self.add(Constant::MethodRef(class, nat))
    }

    pub fn interface_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let nat = self.name_and_type(name, descriptor);
        self.add(Constant::InterfaceMethodRef(class, nat))
    }

    /// `constant_pool_count` as written in the class file.
    pub fn count(&self) -> u32 {
        self.next
    }

    fn write(&self, out: &mut Vec<u8>, class: &str) -> Result<(), CodegenError> {
        for entry in &self.entries {
            match entry {
                Constant::Utf8(text) => {
                    let bytes = modified_utf8(text);
                    let length = u16::try_from(bytes.len()).map_err(|_| CodegenError::ConstantTooLong {
                        class: class.to_string(),
                        length: bytes.len(),
                    })?;
                    out.push(1);
                    out.extend_from_slice(&length.to_be_bytes());
                    out.extend_from_slice(&bytes);
                }
                Constant::Integer(value) => {
                    out.push(3);
                    out.extend_from_slice(&value.to_be_bytes());
                }
                Constant::Long(value) => {
                    out.push(5);
                    out.extend_from_slice(&value.to_be_bytes());
                }
                Constant::Class(name) => {
                    out.push(7);
                    out.extend_from_slice(&name.to_be_bytes());
                }
                Constant::String(utf8) => {
                    out.push(8);
                    out.extend_from_slice(&utf8.to_be_bytes());
                }
                Constant::FieldRef(class, nat) => write_ref(out, 9, *class, *nat),
                Constant::MethodRef(class, nat) => write_ref(out, 10, *class, *nat),
                Constant::InterfaceMethodRef(class, nat) => write_ref(out, 11, *class, *nat),
                Constant::NameAndType(name, descriptor) => write_ref(out, 12, *name, *descriptor),
            }
        }
        Ok(())
    }
}

fn write_ref(out: &mut Vec<u8>, tag: u8, first: u16, second: u16) {
    out.push(tag);
    out.extend_from_slice(&first.to_be_bytes());
    out.extend_from_slice(&second.to_be_bytes());
}

/// Encode as the class file's modified UTF-8 (`\0` as two bytes, UTF-16 surrogates).
pub fn modified_utf8(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

/// Stack slots taken by the arguments and the result of a method descriptor.
pub fn descriptor_slots(descriptor: &str) -> (i32, i32) {
    let mut arguments = 0;
    let mut chars = descriptor.chars().skip(1).peekable();
    while let Some(c) = chars.next() {
        match c {
            ')' => break,
            'J' | 'D' => arguments += 2,
            'L' => {
                for c in chars.by_ref() {
                    if c == ';' {
                        break;
                    }
                }
                arguments += 1;
            }
            '[' => {
                while chars.peek() == Some(&'[') {
                    chars.next();
                }
                if chars.next() == Some('L') {
                    for c in chars.by_ref() {
                        if c == ';' {
                            break;
                        }
                    }
                }
                arguments += 1;
            }
            _ => arguments += 1,
        }
    }
    let result = match chars.next() {
        Some('V') | None => 0,
        Some('J') | Some('D') => 2,
        Some(_) => 1,
    };
    (arguments, result)
}

/// Instructions of one method, with operand stack tracking.
#[derive(Debug, Default)]
pub struct Code {
    bytes: Vec<u8>,
    stack: i32,
    max_stack: i32,
    max_locals: u16,
}

impl Code {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn max_stack(&self) -> u16 {
        self.max_stack.max(0) as u16
    }

    pub fn max_locals(&self) -> u16 {
        self.max_locals
    }

    /// Make sure `slots` local slots are available.
    pub fn reserve_locals(&mut self, slots: u16) {
        self.max_locals = self.max_locals.max(slots);
    }

    /// Current operand stack depth.
    pub fn stack_depth(&self) -> i32 {
        self.stack
    }

    fn adjust(&mut self, delta: i32) {
        self.stack += delta;
        self.max_stack = self.max_stack.max(self.stack);
    }

    fn op(&mut self, opcode: u8, delta: i32) {
        self.bytes.push(opcode);
        self.adjust(delta);
    }

    fn op_u8(&mut self, opcode: u8, operand: u8, delta: i32) {
        self.bytes.push(opcode);
        self.bytes.push(operand);
        self.adjust(delta);
    }

    fn op_u16(&mut self, opcode: u8, operand: u16, delta: i32) {
        self.bytes.push(opcode);
        self.bytes.extend_from_slice(&operand.to_be_bytes());
        self.adjust(delta);
    }

    /// Emit a bare opcode with a known stack effect (`i2l`, `pop`, …).
    pub fn simple(&mut self, opcode: u8, delta: i32) {
        self.op(opcode, delta);
    }

    pub fn push_null(&mut self) {
        self.op(ACONST_NULL, 1);
    }

    pub fn push_int(&mut self, pool: &mut ConstantPool, value: i32) {
        match value {
            -1..=5 => self.op((ICONST_0 as i32 + value) as u8, 1),
            -128..=127 => self.op_u8(BIPUSH, value as u8, 1),
            -32768..=32767 => self.op_u16(SIPUSH, value as u16, 1),
            _ => {
                let index = pool.integer(value);
                self.ldc(index);
            }
        }
    }

    pub fn push_long(&mut self, pool: &mut ConstantPool, value: i64) {
        match value {
            0 | 1 => self.op(LCONST_0 + value as u8, 2),
            _ => {
                let index = pool.long(value);
                self.op_u16(LDC2_W, index, 2);
            }
        }
    }

    pub fn push_string(&mut self, pool: &mut ConstantPool, value: &str) {
        let index = pool.string(value);
        self.ldc(index);
    }

    fn ldc(&mut self, index: u16) {
        if index <= u8::MAX as u16 {
            self.op_u8(LDC, index as u8, 1);
        } else {
            self.op_u16(LDC_W, index, 1);
        }
    }

    fn local_op(&mut self, opcode: u8, short_base: u8, slot: u16, delta: i32) {
        match slot {
            0..=3 => self.op(short_base + slot as u8, delta),
            4..=255 => self.op_u8(opcode, slot as u8, delta),
            _ => {
                self.bytes.push(WIDE);
                self.op_u16(opcode, slot, delta);
            }
        }
    }

    pub fn load(&mut self, ty: &JvmType, slot: u16) {
        let size = ty.size() as i32;
        match ty.sort() {
            Sort::Long => self.local_op(LLOAD, 0x1e, slot, size),
            Sort::Float => self.local_op(FLOAD, 0x22, slot, size),
            Sort::Double => self.local_op(DLOAD, 0x26, slot, size),
            Sort::Object | Sort::Array => self.local_op(ALOAD, 0x2a, slot, size),
            Sort::Void => {}
            _ => self.local_op(ILOAD, 0x1a, slot, size),
        }
    }

    pub fn store(&mut self, ty: &JvmType, slot: u16) {
        let size = ty.size() as i32;
        match ty.sort() {
            Sort::Long => self.local_op(LSTORE, 0x3f, slot, -size),
            Sort::Float => self.local_op(FSTORE, 0x43, slot, -size),
            Sort::Double => self.local_op(DSTORE, 0x47, slot, -size),
            Sort::Object | Sort::Array => self.local_op(ASTORE, 0x4b, slot, -size),
            Sort::Void => {}
            _ => self.local_op(ISTORE, 0x3b, slot, -size),
        }
        self.reserve_locals(slot + ty.size());
    }

    /// Return the value of type `ty` on the stack (`return` for void).
    pub fn return_value(&mut self, ty: &JvmType) {
        let size = ty.size() as i32;
        let opcode = match ty.sort() {
            Sort::Void => RETURN,
            Sort::Long => LRETURN,
            Sort::Float => FRETURN,
            Sort::Double => DRETURN,
            Sort::Object | Sort::Array => ARETURN,
            _ => IRETURN,
        };
        self.op(opcode, -size);
    }

    /// Discard a value of type `ty`.
    pub fn pop(&mut self, ty: &JvmType) {
        match ty.size() {
            0 => {}
            1 => self.op(POP, -1),
            _ => self.op(POP2, -2),
        }
    }

    pub fn dup(&mut self) {
        self.op(DUP, 1);
    }

    pub fn new_object(&mut self, pool: &mut ConstantPool, internal_name: &str) {
        let index = pool.class(internal_name);
        self.op_u16(NEW, index, 1);
    }

    pub fn checkcast(&mut self, pool: &mut ConstantPool, internal_name: &str) {
        let index = pool.class(internal_name);
        self.op_u16(CHECKCAST, index, 0);
    }

    /// `newarray`/`anewarray` for the given element type; the length is on the stack.
    pub fn new_array(&mut self, pool: &mut ConstantPool, element: &JvmType) {
        let primitive = match element.sort() {
            Sort::Boolean => Some(4),
            Sort::Char => Some(5),
            Sort::Float => Some(6),
            Sort::Double => Some(7),
            Sort::Byte => Some(8),
            Sort::Short => Some(9),
            Sort::Int => Some(10),
            Sort::Long => Some(11),
            Sort::Object | Sort::Array | Sort::Void => None,
        };
        match primitive {
            Some(code) => self.op_u8(NEWARRAY, code, 0),
            None => {
                let index = pool.class(&element.class_operand());
                self.op_u16(ANEWARRAY, index, 0);
            }
        }
    }

    /// Store into an array: arrayref, index and value are on the stack.
    pub fn array_store(&mut self, element: &JvmType) {
        let size = element.size() as i32;
        let opcode = match element.sort() {
            Sort::Boolean | Sort::Byte => BASTORE,
            Sort::Char => CASTORE,
            Sort::Short => SASTORE,
            Sort::Int => IASTORE,
            Sort::Long => LASTORE,
            Sort::Float => FASTORE,
            Sort::Double => DASTORE,
            Sort::Object | Sort::Array | Sort::Void => AASTORE,
        };
        self.op(opcode, -2 - size);
    }

    pub fn get_static(&mut self, pool: &mut ConstantPool, owner: &str, name: &str, ty: &JvmType) {
        let index = pool.field_ref(owner, name, ty.descriptor());
        self.op_u16(GETSTATIC, index, ty.size() as i32);
    }

    pub fn put_static(&mut self, pool: &mut ConstantPool, owner: &str, name: &str, ty: &JvmType) {
        let index = pool.field_ref(owner, name, ty.descriptor());
        self.op_u16(PUTSTATIC, index, -(ty.size() as i32));
    }

    pub fn get_field(&mut self, pool: &mut ConstantPool, owner: &str, name: &str, ty: &JvmType) {
        let index = pool.field_ref(owner, name, ty.descriptor());
        self.op_u16(GETFIELD, index, ty.size() as i32 - 1);
    }

    pub fn put_field(&mut self, pool: &mut ConstantPool, owner: &str, name: &str, ty: &JvmType) {
        let index = pool.field_ref(owner, name, ty.descriptor());
        self.op_u16(PUTFIELD, index, -(ty.size() as i32) - 1);
    }

    pub fn invoke_static(&mut self, pool: &mut ConstantPool, owner: &str, name: &str, descriptor: &str) {
        let index = pool.method_ref(owner, name, descriptor);
        let (arguments, result) = descriptor_slots(descriptor);
        self.op_u16(INVOKESTATIC, index, result - arguments);
    }

    pub fn invoke_virtual(&mut self, pool: &mut ConstantPool, owner: &str, name: &str, descriptor: &str) {
        let index = pool.method_ref(owner, name, descriptor);
        let (arguments, result) = descriptor_slots(descriptor);
        self.op_u16(INVOKEVIRTUAL, index, result - arguments - 1);
    }

    pub fn invoke_special(&mut self, pool: &mut ConstantPool, owner: &str, name: &str, descriptor: &str) {
        let index = pool.method_ref(owner, name, descriptor);
        let (arguments, result) = descriptor_slots(descriptor);
        self.op_u16(INVOKESPECIAL, index, result - arguments - 1);
    }

    pub fn invoke_interface(&mut self, pool: &mut ConstantPool, owner: &str, name: &str, descriptor: &str) {
        let index = pool.interface_method_ref(owner, name, descriptor);
        let (arguments, result) = descriptor_slots(descriptor);
        self.op_u16(INVOKEINTERFACE, index, result - arguments - 1);
        self.bytes.push((arguments + 1) as u8);
        self.bytes.push(0);
    }
}

#[derive(Debug)]
struct FieldInfo {
    access: u16,
    name: String,
    descriptor: String,
}

#[derive(Debug)]
struct MethodInfo {
    access: u16,
    name: String,
    descriptor: String,
    code: Option<Code>,
}

/// Builds one class file.
#[derive(Debug)]
pub struct ClassWriter {
    pool: ConstantPool,
    access: u16,
    this_class: String,
    super_class: String,
    interfaces: Vec<String>,
    fields: Vec<FieldInfo>,
    methods: Vec<MethodInfo>,
    source_file: Option<String>,
}

impl ClassWriter {
    pub fn new(access: u16, this_class: impl Into<String>, super_class: impl Into<String>) -> Self {
        Self {
            pool: ConstantPool::new(),
            access,
            this_class: this_class.into(),
            super_class: super_class.into(),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            source_file: None,
        }
    }

    pub fn this_class(&self) -> &str {
        &self.this_class
    }

    pub fn super_class(&self) -> &str {
        &self.super_class
    }

    pub fn pool(&mut self) -> &mut ConstantPool {
        &mut self.pool
    }

    pub fn add_interface(&mut self, internal_name: impl Into<String>) {
        self.interfaces.push(internal_name.into());
    }

    pub fn set_source_file(&mut self, file_name: impl Into<String>) {
        self.source_file = Some(file_name.into());
    }

    pub fn add_field(&mut self, access: u16, name: impl Into<String>, descriptor: impl Into<String>) {
        self.fields.push(FieldInfo {
            access,
            name: name.into(),
            descriptor: descriptor.into(),
        });
    }

    /// Add a method; `code` is `None` for abstract methods.
    pub fn add_method(&mut self, access: u16, name: impl Into<String>, descriptor: impl Into<String>, code: Option<Code>) {
        self.methods.push(MethodInfo {
            access,
            name: name.into(),
            descriptor: descriptor.into(),
            code,
        });
    }

    pub fn has_method(&self, name: &str, descriptor: &str) -> bool {
        self.methods.iter().any(|m| m.name == name && m.descriptor == descriptor)
    }

    /// Serialize the class file.
    pub fn to_bytes(mut self) -> Result<Vec<u8>, CodegenError> {
        // Everything the pool needs is interned before it is written
        let this_index = self.pool.class(&self.this_class);
        let super_index = self.pool.class(&self.super_class);
        let interface_indices: Vec<u16> = self
            .interfaces
            .iter()
            .map(|name| self.pool.class(name))
            .collect();
        let code_name = self.pool.utf8("Code");
        let fields: Vec<(u16, u16, u16)> = self
            .fields
            .iter()
            .map(|f| (f.access, self.pool.utf8(&f.name), self.pool.utf8(&f.descriptor)))
            .collect();
        let methods: Vec<(u16, u16, u16)> = self
            .methods
            .iter()
            .map(|m| (m.access, self.pool.utf8(&m.name), self.pool.utf8(&m.descriptor)))
            .collect();
        let source_file = self
            .source_file
            .as_ref()
            .map(|file| (self.pool.utf8("SourceFile"), self.pool.utf8(file)));

        if self.pool.count() > u16::MAX as u32 {
            return Err(CodegenError::ConstantPoolOverflow {
                class: self.this_class.clone(),
            });
        }

        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&MINOR_VERSION.to_be_bytes());
        out.extend_from_slice(&MAJOR_VERSION.to_be_bytes());
        out.extend_from_slice(&(self.pool.count() as u16).to_be_bytes());
        self.pool.write(&mut out, &self.this_class)?;

        out.extend_from_slice(&self.access.to_be_bytes());
        out.extend_from_slice(&this_index.to_be_bytes());
        out.extend_from_slice(&super_index.to_be_bytes());
        out.extend_from_slice(&(interface_indices.len() as u16).to_be_bytes());
        for index in interface_indices {
            out.extend_from_slice(&index.to_be_bytes());
        }

        out.extend_from_slice(&(fields.len() as u16).to_be_bytes());
        for (access, name, descriptor) in fields {
            out.extend_from_slice(&access.to_be_bytes());
            out.extend_from_slice(&name.to_be_bytes());
            out.extend_from_slice(&descriptor.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());
        }

        out.extend_from_slice(&(methods.len() as u16).to_be_bytes());
        for ((access, name, descriptor), method) in methods.into_iter().zip(&self.methods) {
            out.extend_from_slice(&access.to_be_bytes());
            out.extend_from_slice(&name.to_be_bytes());
            out.extend_from_slice(&descriptor.to_be_bytes());
            match &method.code {
                Some(code) => {
                    if code.bytes.len() > u16::MAX as usize {
                        return Err(CodegenError::MethodTooLarge {
                            class: self.this_class.clone(),
                            method: method.name.clone(),
                        });
                    }
                    out.extend_from_slice(&1u16.to_be_bytes());
                    out.extend_from_slice(&code_name.to_be_bytes());
                    let length = 2 + 2 + 4 + code.bytes.len() as u32 + 2 + 2;
                    out.extend_from_slice(&length.to_be_bytes());
                    out.extend_from_slice(&code.max_stack().to_be_bytes());
                    out.extend_from_slice(&code.max_locals().to_be_bytes());
                    out.extend_from_slice(&(code.bytes.len() as u32).to_be_bytes());
                    out.extend_from_slice(&code.bytes);
                    out.extend_from_slice(&0u16.to_be_bytes());
                    out.extend_from_slice(&0u16.to_be_bytes());
                }
                None => out.extend_from_slice(&0u16.to_be_bytes()),
            }
        }

        match source_file {
            Some((name, file)) => {
                out.extend_from_slice(&1u16.to_be_bytes());
                out.extend_from_slice(&name.to_be_bytes());
                out.extend_from_slice(&2u32.to_be_bytes());
                out.extend_from_slice(&file.to_be_bytes());
            }
            None => out.extend_from_slice(&0u16.to_be_bytes()),
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_deduplicates() {
        let mut pool = ConstantPool::new();
        let a = pool.class("java/lang/Object");
        let b = pool.class("java/lang/Object");
        assert_eq!(a, b);
        // utf8 + class
        assert_eq!(pool.count(), 3);
    }

    #[test]
    fn test_long_takes_two_slots() {
        let mut pool = ConstantPool::new();
        let long = pool.long(1 << 40);
        let next = pool.integer(7);
        assert_eq!(next, long + 2);
    }

    #[test]
    fn test_modified_utf8() {
        assert_eq!(modified_utf8("a"), vec![b'a']);
        assert_eq!(modified_utf8("\0"), vec![0xC0, 0x80]);
        // U+1F600 as a surrogate pair, three bytes each
        assert_eq!(modified_utf8("\u{1F600}").len(), 6);
    }

    #[test]
    fn test_descriptor_slots() {
        assert_eq!(descriptor_slots("()V"), (0, 0));
        assert_eq!(descriptor_slots("([Ljava/lang/String;)V"), (1, 0));
        assert_eq!(descriptor_slots("(IJLjava/lang/Object;[[I)J"), (5, 2));
    }

    #[test]
    fn test_stack_tracking() {
        let mut pool = ConstantPool::new();
        let mut code = Code::new();
        code.get_static(&mut pool, "java/lang/System", "out", &JvmType::object("java/io/PrintStream"));
        code.push_long(&mut pool, 42);
        code.invoke_virtual(&mut pool, "java/io/PrintStream", "println", "(J)V");
        code.return_value(&JvmType::VOID);
        assert_eq!(code.max_stack(), 3);
        assert_eq!(code.stack_depth(), 0);
    }

    #[test]
    fn test_oversized_utf8_constant_is_rejected() {
        let mut writer = ClassWriter::new(access::PUBLIC | access::SUPER, "demo/Big", "java/lang/Object");
        let mut code = Code::new();
        code.push_string(writer.pool(), &"x".repeat(65_536));
        code.return_value(&JvmType::VOID);
        writer.add_method(access::PUBLIC | access::STATIC, "run", "()V", Some(code));

        match writer.to_bytes() {
            Err(CodegenError::ConstantTooLong { class, length }) => {
                assert_eq!(class, "demo/Big");
                assert_eq!(length, 65_536);
            }
            other => panic!("expected ConstantTooLong, got {:?}", other.map(|bytes| bytes.len())),
        }
    }

    #[test]
    fn test_utf8_constant_at_limit_fits() {
        let mut writer = ClassWriter::new(access::PUBLIC | access::SUPER, "demo/Edge", "java/lang/Object");
        writer.pool().utf8(&"x".repeat(65_535));
        assert!(writer.to_bytes().is_ok());
    }

    #[test]
    fn test_class_header() {
        let mut writer = ClassWriter::new(access::PUBLIC | access::SUPER, "demo/Hello", "java/lang/Object");
        writer.set_source_file("hello.kt");
        let mut code = Code::new();
        code.return_value(&JvmType::VOID);
        code.reserve_locals(1);
        writer.add_method(access::PUBLIC | access::STATIC, "main", "([Ljava/lang/String;)V", Some(code));
        let bytes = writer.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), MAJOR_VERSION);
    }
}
