use soapbind_wsdl::{
    BindingStyle, ContractError, DeclaredStyle, OperationKey, PartReference, QualifiedName,
    SoapVersion,
    schema::{MaxOccurs, ScalarType, TypeRef},
};
use std::fs;

#[cfg(test)]
mod tests {
    use super::*;

    fn load(name: &str) -> String {
        fs::read_to_string(format!("tests/resources/{name}"))
            .unwrap_or_else(|e| panic!("Failed to read {name}: {e}"))
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_doc_literal_contract() {
        let source = load("doc_literal_test.wsdl");
        let contract = soapbind_wsdl::parse(source.as_str()).expect("contract should parse");

        assert_eq!(contract.source(), source);
        assert_eq!(contract.name(), Some("DocLiteralTest"));
        assert_eq!(
            contract.target_namespace(),
            Some("http://example.com/doc_literal_test.wsdl")
        );

        let service = contract.service("DocLiteralService").expect("service");
        assert_eq!(
            service.address.as_deref(),
            Some("http://localhost:15099/doc_literal_test")
        );
        let port = &service.ports["DocLiteralPort"];
        assert_eq!(port.binding.style, DeclaredStyle::Document);
        assert_eq!(port.binding.soap_version, SoapVersion::V11);

        let op = port.operation("myMethod").expect("operation");
        assert_eq!(
            op.soap_action.as_deref(),
            Some("http://example.com/doc_literal_test/myMethod")
        );
        assert_eq!(
            op.documentation.as_deref(),
            Some("Checks whether x is greater than y.")
        );
        assert_eq!(op.rule.style, BindingStyle::DocumentLiteral);
        assert!(op.rule.input.wrapper.is_none());

        let xsd = "http://example.com/doc_literal_test.xsd";
        let keys: Vec<_> = op.rule.input.slots.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, ["xElement", "yElement"]);
        assert_eq!(
            op.rule.input.slots[0].element,
            QualifiedName::new(Some(xsd), "xElement")
        );
        assert_eq!(op.rule.input.slots[0].part.as_deref(), Some("x"));
        assert_eq!(
            op.rule.input.slots[1].type_ref,
            TypeRef::Scalar(ScalarType::Float)
        );

        let output = op.rule.output.as_ref().expect("output layout");
        assert!(output.wrapper.is_none());
        assert_eq!(output.slots[0].key, "zElement");
        assert_eq!(
            output.slots[0].type_ref,
            TypeRef::Scalar(ScalarType::Boolean)
        );

        // the contract's own prefix is kept for the schema namespace
        assert_eq!(contract.schema().prefixes().prefix(xsd), Some("xsd1"));
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_doc_literal_wrapped_contract() {
        let contract = soapbind_wsdl::parse(load("doc_literal_wrapped_test.wsdl")).unwrap();
        let key = OperationKey::new(
            "DocLiteralWrappedService",
            "DocLiteralWrappedPort",
            "myMethod",
        );
        let (_, op) = contract.operation(&key).expect("operation by key");

        assert_eq!(op.rule.style, BindingStyle::DocumentLiteralWrapped);
        let xsd = "http://example.com/doc_literal_wrapped_test.xsd";
        assert_eq!(
            op.rule.input.wrapper,
            Some(QualifiedName::new(Some(xsd), "myMethod"))
        );
        let keys: Vec<_> = op.rule.input.slots.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, ["x", "y"]);
        // elementFormDefault is unqualified, so fields carry no namespace
        assert_eq!(op.rule.input.slots[0].element, QualifiedName::unqualified("x"));

        let output = op.rule.output.as_ref().unwrap();
        assert_eq!(
            output.wrapper,
            Some(QualifiedName::new(Some(xsd), "myMethodResponse"))
        );
        assert_eq!(output.slots[0].key, "z");
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_rpc_and_soap12_contract() {
        let contract = soapbind_wsdl::parse(load("calculator.wsdl")).unwrap();

        let services: Vec<_> = contract.services().map(|s| s.name.as_str()).collect();
        assert_eq!(services, ["CalculatorService", "DirectoryService"]);

        let calculator = contract.service("CalculatorService").unwrap();
        assert_eq!(
            calculator.address.as_deref(),
            Some("http://localhost:8080/calculator")
        );
        // the http:binding port is not a SOAP port
        let ports: Vec<_> = calculator.ports.keys().map(String::as_str).collect();
        assert_eq!(ports, ["CalculatorSoap", "CalculatorSoap12"]);
        assert!(logs_contain("skipping binding without a SOAP binding extension"));

        let soap11 = &calculator.ports["CalculatorSoap"];
        let add = soap11.operation("Add").unwrap();
        assert_eq!(add.rule.style, BindingStyle::RpcLiteral);
        assert_eq!(
            add.rule.input.wrapper,
            Some(QualifiedName::new(Some("urn:example:calculator:rpc"), "Add"))
        );
        assert_eq!(add.rule.input.slots[1].element, QualifiedName::unqualified("b"));
        assert_eq!(
            add.rule.output.as_ref().unwrap().wrapper,
            Some(QualifiedName::new(
                Some("urn:example:calculator:rpc"),
                "AddResponse"
            ))
        );
        assert_eq!(add.input_headers.len(), 1);
        assert_eq!(add.input_headers[0].part.name, "auth");
        assert_eq!(add.output_headers.len(), 1);
        assert_eq!(add.output_headers[0].part.name, "receipt");
        assert_eq!(
            add.input_headers[0].part.reference,
            PartReference::Element(QualifiedName::new(
                Some("urn:example:calculator:types"),
                "Auth"
            ))
        );

        let ping = soap11.operation("Ping").unwrap();
        assert!(ping.is_one_way());
        // no soap:body namespace falls back to the definitions target namespace
        assert_eq!(
            ping.rule.input.wrapper,
            Some(QualifiedName::new(Some("urn:example:calculator"), "Ping"))
        );

        let soap12 = &calculator.ports["CalculatorSoap12"];
        assert_eq!(soap12.binding.soap_version, SoapVersion::V12);
        assert_eq!(
            soap12.operation("Add").unwrap().soap_action.as_deref(),
            Some("urn:example:calculator#Add12")
        );

        let get_person = contract.service("DirectoryService").unwrap().ports["DirectorySoap12"]
            .operation("GetPerson")
            .unwrap();
        assert_eq!(get_person.rule.style, BindingStyle::DocumentLiteralWrapped);
        assert_eq!(get_person.faults, ["NotFound"]);

        assert_eq!(contract.find_operations("Add").len(), 2);
        assert_eq!(contract.find_operations("GetPerson").len(), 1);
        assert_eq!(contract.operations().count(), 5);
    }

    #[test]
    fn test_schema_inheritance_and_occurrence() {
        let contract = soapbind_wsdl::parse(load("calculator.wsdl")).unwrap();
        let schema = contract.schema();
        let types = "urn:example:calculator:types";

        let person = schema
            .complex_type_named(&QualifiedName::new(Some(types), "Person"))
            .expect("Person type");
        let fields = schema.fields(person);
        let names: Vec<_> = fields.iter().map(|f| f.name.local.as_str()).collect();
        assert_eq!(
            names,
            ["name", "email", "born", "phone", "nickname", "age", "level", "manager"]
        );

        // elementFormDefault="qualified"
        assert_eq!(fields[0].name.namespace(), Some(types));
        assert_eq!(fields[1].min_occurs, 0);
        assert_eq!(fields[3].max_occurs, MaxOccurs::Unbounded);
        assert!(fields[4].nillable);
        assert_eq!(fields[5].type_ref, TypeRef::Scalar(ScalarType::UnsignedByte));
        // simple type restriction maps to its base scalar
        assert_eq!(fields[6].type_ref, TypeRef::Scalar(ScalarType::String));
        // recursive reference
        assert_eq!(fields[7].type_ref, TypeRef::Complex(person));
    }

    #[test]
    fn test_reparse_yields_identical_rules() {
        let source = load("calculator.wsdl");
        let first = soapbind_wsdl::parse(source.as_str()).unwrap();
        let second = soapbind_wsdl::parse(source.as_str()).unwrap();

        for ((key_a, _, op_a), (key_b, _, op_b)) in first.operations().zip(second.operations()) {
            assert_eq!(key_a, key_b);
            assert_eq!(op_a.rule, op_b.rule);
        }
    }

    #[test]
    fn test_generated_prefix_for_undeclared_body_namespace() {
        let contract = soapbind_wsdl::parse(load("calculator.wsdl")).unwrap();
        let prefixes = contract.schema().prefixes();

        assert_eq!(prefixes.prefix("urn:example:calculator"), Some("tns"));
        assert_eq!(prefixes.prefix("urn:example:calculator:types"), Some("types"));
        assert_eq!(prefixes.prefix("urn:example:calculator:rpc"), Some("ns1"));
    }

    fn definitions(body: &str) -> String {
        format!(
            r#"<definitions targetNamespace="urn:t" xmlns:tns="urn:t"
                 xmlns:xsd="http://www.w3.org/2001/XMLSchema"
                 xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
                 xmlns="http://schemas.xmlsoap.org/wsdl/">{body}</definitions>"#
        )
    }

    const PORT_TYPE: &str = r#"
        <message name="In"><part name="a" type="xsd:int"/></message>
        <portType name="PT"><operation name="Op"><input message="tns:In"/></operation></portType>"#;

    fn binding(style: &str, transport: &str, body_use: &str) -> String {
        format!(
            r#"<binding name="B" type="tns:PT">
                 <soap:binding style="{style}" transport="{transport}"/>
                 <operation name="Op"><input><soap:body use="{body_use}"/></input></operation>
               </binding>"#
        )
    }

    #[test]
    fn test_not_a_wsdl_document() {
        let result = soapbind_wsdl::parse("<html><body/></html>");
        assert!(matches!(result, Err(ContractError::NotAWsdlDocument(ref root)) if root == "html"));

        let result = soapbind_wsdl::parse("<definitions");
        assert!(matches!(result, Err(ContractError::Xml(_))));
    }

    #[test]
    fn test_undefined_message() {
        let source = definitions(
            r#"<portType name="PT"><operation name="Op"><input message="tns:Missing"/></operation></portType>
               <binding name="B" type="tns:PT">
                 <soap:binding style="rpc" transport="http://schemas.xmlsoap.org/soap/http"/>
                 <operation name="Op"/>
               </binding>"#,
        );
        let result = soapbind_wsdl::parse(source);
        assert!(
            matches!(result, Err(ContractError::UndefinedMessage { ref message, .. }) if message == "tns:Missing"),
            "unexpected result: {result:?}"
        );
    }

    #[test]
    fn test_undefined_port_type() {
        let source = definitions(
            r#"<binding name="B" type="tns:Nowhere">
                 <soap:binding style="rpc" transport="http://schemas.xmlsoap.org/soap/http"/>
               </binding>"#,
        );
        let result = soapbind_wsdl::parse(source);
        assert!(matches!(result, Err(ContractError::UndefinedPortType { .. })));
    }

    #[test]
    fn test_undefined_binding() {
        let source = definitions(&format!(
            r#"{PORT_TYPE}{}
               <service name="S"><port name="P" binding="tns:Other"/></service>"#,
            binding("rpc", "http://schemas.xmlsoap.org/soap/http", "literal")
        ));
        let result = soapbind_wsdl::parse(source);
        assert!(
            matches!(result, Err(ContractError::UndefinedBinding { ref port, .. }) if port == "P")
        );
    }

    #[test]
    fn test_undefined_binding_operation() {
        let source = definitions(&format!(
            r#"{PORT_TYPE}
               <binding name="B" type="tns:PT">
                 <soap:binding style="rpc" transport="http://schemas.xmlsoap.org/soap/http"/>
                 <operation name="Other"/>
               </binding>"#
        ));
        let result = soapbind_wsdl::parse(source);
        assert!(matches!(
            result,
            Err(ContractError::UndefinedOperation { ref operation, .. }) if operation == "Other"
        ));
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_foreign_namespace_references_resolve_by_local_name() {
        let source = definitions(
            r#"<types><xsd:schema targetNamespace="urn:t">
                 <xsd:element name="e" type="xsd:int"/>
               </xsd:schema></types>
               <message name="In" xmlns:other="urn:other"><part name="a" element="other:e"/></message>
               <portType name="PT"><operation name="Op"><input message="tns:In"/></operation></portType>
               <binding name="B" type="other:PT" xmlns:other="urn:other">
                 <soap:binding style="document" transport="http://schemas.xmlsoap.org/soap/http"/>
                 <operation name="Op"><input><soap:body use="literal"/></input></operation>
               </binding>
               <service name="S"><port name="P" binding="tns:B">
                 <soap:address location="http://localhost/s"/>
               </port></service>"#,
        );
        let contract = soapbind_wsdl::parse(source).unwrap();

        assert_eq!(contract.find_operations("Op").len(), 1);
        assert!(logs_contain("reference outside the target namespace"));
        assert!(logs_contain("resolved schema reference by local name"));
    }

    #[test]
    fn test_undefined_schema_element() {
        let source = definitions(
            r#"<message name="In"><part name="a" element="tns:nothing"/></message>"#,
        );
        let result = soapbind_wsdl::parse(source);
        assert!(matches!(result, Err(ContractError::UndefinedElement { .. })));
    }

    #[test]
    fn test_unresolved_schema_type() {
        let source = definitions(
            r#"<types><xsd:schema targetNamespace="urn:t">
                 <xsd:element name="e" type="tns:Missing"/>
               </xsd:schema></types>"#,
        );
        let result = soapbind_wsdl::parse(source);
        assert!(matches!(result, Err(ContractError::UnresolvedType { .. })));

        let source =
            definitions(r#"<message name="In"><part name="a" type="xsd:notAType"/></message>"#);
        let result = soapbind_wsdl::parse(source);
        assert!(matches!(result, Err(ContractError::UnresolvedType { .. })));
    }

    #[test]
    fn test_undeclared_prefix() {
        let source =
            definitions(r#"<message name="In"><part name="a" type="nope:int"/></message>"#);
        let result = soapbind_wsdl::parse(source);
        assert!(matches!(
            result,
            Err(ContractError::UnresolvedPrefix { ref prefix, .. }) if prefix == "nope"
        ));
    }

    #[test]
    fn test_part_without_type() {
        let source = definitions(r#"<message name="In"><part name="a"/></message>"#);
        let result = soapbind_wsdl::parse(source);
        assert!(matches!(result, Err(ContractError::PartWithoutType { .. })));
    }

    #[test]
    fn test_encoded_use_is_rejected() {
        let source = definitions(&format!(
            "{PORT_TYPE}{}",
            binding("rpc", "http://schemas.xmlsoap.org/soap/http", "encoded")
        ));
        let result = soapbind_wsdl::parse(source);
        assert!(matches!(result, Err(ContractError::UnsupportedUse { .. })));
    }

    #[test]
    fn test_non_http_transport_is_rejected() {
        let source = definitions(&format!(
            "{PORT_TYPE}{}",
            binding("rpc", "http://example.com/smtp", "literal")
        ));
        let result = soapbind_wsdl::parse(source);
        assert!(matches!(
            result,
            Err(ContractError::UnsupportedTransport { ref transport, .. }) if transport == "http://example.com/smtp"
        ));
    }

    #[test]
    fn test_invalid_style_is_rejected() {
        let source = definitions(&format!(
            "{PORT_TYPE}{}",
            binding("procedural", "http://schemas.xmlsoap.org/soap/http", "literal")
        ));
        let result = soapbind_wsdl::parse(source);
        assert!(matches!(result, Err(ContractError::InvalidAttribute { .. })));
    }

    #[test]
    fn test_duplicate_message() {
        let source = definitions(
            r#"<message name="In"/><message name="In"/>"#,
        );
        let result = soapbind_wsdl::parse(source);
        assert!(matches!(
            result,
            Err(ContractError::Duplicate { kind: "message", .. })
        ));
    }

    #[test]
    fn test_operation_style_overrides_binding_style() {
        let source = definitions(&format!(
            r#"{PORT_TYPE}
               <binding name="B" type="tns:PT">
                 <soap:binding style="document" transport="http://schemas.xmlsoap.org/soap/http"/>
                 <operation name="Op">
                   <soap:operation style="rpc"/>
                   <input><soap:body use="literal"/></input>
                 </operation>
               </binding>
               <service name="S"><port name="P" binding="tns:B"/></service>"#
        ));
        let contract = soapbind_wsdl::parse(source).unwrap();
        let (port, op) = contract
            .operation(&OperationKey::new("S", "P", "Op"))
            .unwrap();

        assert!(port.address.is_none());
        assert_eq!(op.rule.style, BindingStyle::RpcLiteral);
        assert_eq!(
            op.rule.input.wrapper,
            Some(QualifiedName::new(Some("urn:t"), "Op"))
        );
    }
}
