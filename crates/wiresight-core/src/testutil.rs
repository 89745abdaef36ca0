//! Shared test fixtures.
//!
//! Descriptor sets are built programmatically from `prost-types` and
//! encoded with `prost`, so tests never depend on checked-in binary
//! fixtures or a protoc installation.

use prost::Message as _;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet,
};

fn field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        json_name: Some(name.to_string()),
        ..Default::default()
    }
}

fn typed_field(name: &str, number: i32, ty: Type, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_string()),
        ..field(name, number, ty)
    }
}

fn repeated_field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        label: Some(Label::Repeated as i32),
        ..field(name, number, ty)
    }
}

fn single_field_message(name: &str, field_name: &str, ty: Type) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: vec![field(field_name, 1, ty)],
        ..Default::default()
    }
}

fn example_file() -> FileDescriptorProto {
    let color = EnumDescriptorProto {
        name: Some("Color".to_string()),
        value: vec![
            EnumValueDescriptorProto {
                name: Some("COLOR_UNSPECIFIED".to_string()),
                number: Some(0),
                ..Default::default()
            },
            EnumValueDescriptorProto {
                name: Some("RED".to_string()),
                number: Some(1),
                ..Default::default()
            },
            EnumValueDescriptorProto {
                name: Some("BLUE".to_string()),
                number: Some(2),
                ..Default::default()
            },
        ],
        ..Default::default()
    };

    let msg_kinds = DescriptorProto {
        name: Some("MsgKinds".to_string()),
        field: vec![
            field("delta", 1, Type::Sint32),
            field("flag", 2, Type::Bool),
            typed_field("color", 3, Type::Enum, ".com.example.Color"),
            field("data", 4, Type::Bytes),
            repeated_field("nums", 5, Type::Uint32),
            field("ratio", 6, Type::Double),
        ],
        ..Default::default()
    };

    let outer = DescriptorProto {
        name: Some("Outer".to_string()),
        field: vec![typed_field(
            "inner",
            1,
            Type::Message,
            ".com.example.Outer.Inner",
        )],
        nested_type: vec![single_field_message("Inner", "label", Type::String)],
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("example.proto".to_string()),
        package: Some("com.example".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![
            single_field_message("MsgAlpha", "a", Type::Uint64),
            single_field_message("MsgBeta", "b", Type::Uint64),
            msg_kinds,
            single_field_message("MsgText", "text", Type::String),
            outer,
        ],
        enum_type: vec![color],
        ..Default::default()
    }
}

/// A one-file descriptor set: `com.example.{MsgAlpha, MsgBeta, MsgKinds,
/// MsgText, Outer, Outer.Inner}` plus the `Color` enum.
pub(crate) fn descriptor_set_bytes() -> Vec<u8> {
    FileDescriptorSet {
        file: vec![example_file()],
    }
    .encode_to_vec()
}

/// A two-file descriptor set: everything above plus
/// `org.other.{MsgText, Blob}`.
pub(crate) fn two_file_descriptor_set_bytes() -> Vec<u8> {
    let other = FileDescriptorProto {
        name: Some("other.proto".to_string()),
        package: Some("org.other".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![
            single_field_message("MsgText", "text", Type::String),
            single_field_message("Blob", "data", Type::Bytes),
        ],
        ..Default::default()
    };

    FileDescriptorSet {
        file: vec![example_file(), other],
    }
    .encode_to_vec()
}
