use soapbind_core::{
    CodecError, Decoded, Record, Value, coerce::CoercionError, envelope::codec,
};
use soapbind_wsdl::{ContractDescriptor, Direction, OperationDescriptor, SoapVersion};
use soapbind_xml::{XmlError, builder::XmlBuilderError};
use std::{fs, sync::Arc};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn contract(name: &str) -> ContractDescriptor {
        let source = fs::read_to_string(format!("tests/resources/{name}"))
            .unwrap_or_else(|e| panic!("Failed to read {name}: {e}"));
        soapbind_wsdl::parse(source).expect("contract should parse")
    }

    fn operation(
        contract: &ContractDescriptor,
        service: &str,
        port: &str,
        name: &str,
    ) -> Arc<OperationDescriptor> {
        let port = &contract.service(service).expect("service").ports[port];
        Arc::clone(port.operation(name).expect("operation"))
    }

    fn message(decoded: Decoded) -> soapbind_core::Message {
        match decoded {
            Decoded::Message(message) => message,
            Decoded::Fault(fault) => panic!("unexpected fault: {fault}"),
        }
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_doc_literal_body_has_no_wrapper() {
        let contract = contract("doc_literal_test.wsdl");
        let op = operation(&contract, "DocLiteralService", "DocLiteralPort", "myMethod");
        let args = Value::from(Record::new().with("xElement", 100).with("yElement", 10.55));

        let xml = codec::encode_to_string(&op, Direction::Input, &args, None, false).unwrap();
        assert!(xml.contains(
            "<soap:Body><xsd1:xElement>100</xsd1:xElement><xsd1:yElement>10.55</xsd1:yElement></soap:Body>"
        ));
        assert!(xml.contains(r#"xmlns:xsd1="http://example.com/doc_literal_test.xsd""#));

        let decoded = message(codec::decode(&op, Direction::Input, &xml).unwrap());
        assert_eq!(decoded.body, args);
        assert_eq!(decoded.header, None);
        assert_eq!(decoded.version, SoapVersion::V11);
    }

    #[test]
    fn test_doc_literal_parts_are_addressable_by_part_name() {
        let contract = contract("doc_literal_test.wsdl");
        let op = operation(&contract, "DocLiteralService", "DocLiteralPort", "myMethod");
        let by_part = Value::from(Record::new().with("x", 1).with("y", 2.5));
        let by_element = Value::from(Record::new().with("xElement", 1).with("yElement", 2.5));

        let a = codec::encode_to_string(&op, Direction::Input, &by_part, None, true).unwrap();
        let b = codec::encode_to_string(&op, Direction::Input, &by_element, None, true).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_doc_literal_single_output_decodes_to_bare_value() {
        let contract = contract("doc_literal_test.wsdl");
        let op = operation(&contract, "DocLiteralService", "DocLiteralPort", "myMethod");

        let record = Value::from(Record::new().with("zElement", true));
        let xml = codec::encode_to_string(&op, Direction::Output, &record, None, true).unwrap();
        assert!(xml.contains("<xsd1:zElement>true</xsd1:zElement>"));
        assert_eq!(
            message(codec::decode(&op, Direction::Output, &xml).unwrap()).body,
            Value::from(true)
        );

        // a bare value is accepted for a single unwrapped part
        let bare = codec::encode_to_string(&op, Direction::Output, &Value::from(true), None, true)
            .unwrap();
        assert_eq!(bare, xml);
    }

    #[test]
    fn test_wrapped_result_keeps_the_wrapper_record() {
        let contract = contract("doc_literal_wrapped_test.wsdl");
        let op = operation(
            &contract,
            "DocLiteralWrappedService",
            "DocLiteralWrappedPort",
            "myMethod",
        );

        let args = Value::from(Record::new().with("x", 100).with("y", 10.55));
        let request = codec::encode_to_string(&op, Direction::Input, &args, None, true).unwrap();
        assert!(request.contains("<xsd1:myMethod><x>100</x><y>10.55</y></xsd1:myMethod>"));

        let result = Value::from(Record::new().with("z", true));
        let response = codec::encode_to_string(&op, Direction::Output, &result, None, true).unwrap();
        assert!(response.contains("<soap:Body><xsd1:myMethodResponse><z>true</z></xsd1:myMethodResponse></soap:Body>"));

        let decoded = message(codec::decode(&op, Direction::Output, &response).unwrap());
        assert_eq!(decoded.body, result);
        assert_eq!(
            serde_json::to_value(&decoded.body).unwrap(),
            serde_json::json!({ "z": true })
        );
    }

    #[test]
    fn test_rpc_wrapper_and_typed_header() {
        let contract = contract("calculator.wsdl");
        let op = operation(&contract, "CalculatorService", "CalculatorSoap", "Add");

        let args = Value::from(Record::new().with("a", 2).with("b", 3));
        let header = Value::from(
            Record::new().with("Auth", Record::new().with("user", "ada").with("token", "t<1>")),
        );
        let xml = codec::encode_to_string(&op, Direction::Input, &args, Some(&header), true).unwrap();

        assert!(xml.contains("<ns1:Add><a>2</a><b>3</b></ns1:Add>"));
        assert!(xml.contains(
            "<soap:Header><types:Auth><types:user>ada</types:user><types:token>t&lt;1&gt;</types:token></types:Auth></soap:Header>"
        ));

        let decoded = message(codec::decode(&op, Direction::Input, &xml).unwrap());
        assert_eq!(decoded.body, args);
        assert_eq!(decoded.header, Some(header));
    }

    #[test]
    fn test_undeclared_header_entries_are_generic() {
        let contract = contract("calculator.wsdl");
        let op = operation(&contract, "CalculatorService", "CalculatorSoap", "Add");

        let args = Value::from(Record::new().with("a", 1).with("b", 1));
        let header = Value::from(Record::new().with("trace", Record::new().with("id", "42")));
        let xml = codec::encode_to_string(&op, Direction::Input, &args, Some(&header), true).unwrap();
        assert!(xml.contains("<soap:Header><trace><id>42</id></trace></soap:Header>"));

        let decoded = message(codec::decode(&op, Direction::Input, &xml).unwrap());
        assert_eq!(decoded.header, Some(header));
    }

    #[test]
    fn test_complex_values_with_nil_lists_and_absent_fields() {
        let contract = contract("calculator.wsdl");
        let op = operation(&contract, "DirectoryService", "DirectorySoap12", "GetPerson");
        let born = DateTime::parse_from_rfc3339("1815-12-10T00:00:00Z").unwrap();

        let person = Record::new()
            .with("name", "Ada")
            .with("born", born)
            .with("phone", vec![Value::from("1"), Value::from("2")])
            .with("nickname", Value::Nil)
            .with("age", 36);
        let result = Value::from(Record::new().with("person", person));

        let xml = codec::encode_to_string(&op, Direction::Output, &result, None, true).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("http://www.w3.org/2003/05/soap-envelope"));
        assert!(xml.contains("<types:phone>1</types:phone><types:phone>2</types:phone>"));
        assert!(xml.contains(r#"<types:nickname xsi:nil="true"/>"#));
        assert!(!xml.contains("email"));

        let decoded = message(codec::decode(&op, Direction::Output, &xml).unwrap());
        assert_eq!(decoded.version, SoapVersion::V12);
        let person = decoded.body.get("person");
        assert_eq!(person.get("name").as_str(), Some("Ada"));
        assert_eq!(person.get("born"), &Value::from(born));
        assert_eq!(
            person.get("phone").as_list(),
            Some([Value::from("1"), Value::from("2")].as_slice())
        );
        assert!(person.get("nickname").is_nil());
        assert_eq!(person.get("age").as_i64(), Some(36));
        assert!(person.get("email").is_absent());
        assert!(person.get("level").is_absent());
        assert!(person.get("manager").is_absent());
    }

    #[test]
    fn test_absent_optional_part_round_trips_as_absent() {
        let contract = contract("calculator.wsdl");
        let op = operation(&contract, "DirectoryService", "DirectorySoap12", "GetPerson");

        let xml =
            codec::encode_to_string(&op, Direction::Output, &Value::from(Record::new()), None, true)
                .unwrap();
        assert!(xml.contains("<types:GetPersonResponse/>"));

        let decoded = message(codec::decode(&op, Direction::Output, &xml).unwrap());
        let record = decoded.body.as_record().expect("wrapper record");
        assert!(record.get("person").is_some_and(Value::is_absent));
    }

    #[test]
    fn test_scalar_fields_survive_encode_then_decode() {
        let contract = contract("scalars.wsdl");
        let op = operation(&contract, "ScalarsService", "ScalarsPort", "Echo");
        let at = DateTime::parse_from_rfc3339("2024-03-01T10:20:30.5-05:00").unwrap();
        let on = chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();

        let args = Value::from(
            Record::new()
                .with("text", " a < b & \"c\" ")
                .with("flag", true)
                .with("small", -32768)
                .with("low", i64::MIN)
                .with("high", i64::MAX)
                .with("count", u32::MAX)
                .with("total", i64::MAX)
                .with("ratio", 10.55)
                .with("limit", f64::INFINITY)
                .with("floor", f64::NEG_INFINITY)
                .with("price", -0.125)
                .with("at", at)
                .with("on", on),
        );

        for direction in [Direction::Input, Direction::Output] {
            let xml = codec::encode_to_string(&op, direction, &args, None, true).unwrap();
            assert!(xml.contains("INF</"));
            let decoded = message(codec::decode(&op, direction, &xml).unwrap());
            assert_eq!(decoded.body, args, "{direction:?}");
        }
    }

    #[test]
    fn test_characters_outside_xml_fail_encoding() {
        let contract = contract("calculator.wsdl");
        let op = operation(&contract, "DirectoryService", "DirectorySoap12", "GetPerson");
        let person = Record::new()
            .with("name", "a\u{1}b")
            .with("born", "2024-03-01T10:20:30Z")
            .with("nickname", Value::Nil)
            .with("age", 30);
        let result = Value::from(Record::new().with("person", person));

        assert!(matches!(
            codec::encode_to_string(&op, Direction::Output, &result, None, true),
            Err(CodecError::Xml(XmlError::BuilderError(XmlBuilderError::InvalidChar {
                character: '\u{1}'
            })))
        ));
    }

    #[test]
    fn test_encoding_errors_name_the_element() {
        let contract = contract("doc_literal_test.wsdl");
        let op = operation(&contract, "DocLiteralService", "DocLiteralPort", "myMethod");

        let missing = Value::from(Record::new().with("xElement", 1));
        assert!(matches!(
            codec::encode(&op, Direction::Input, &missing, None),
            Err(CodecError::MissingValue { element }) if element == "yElement"
        ));

        let not_a_number = Value::from(Record::new().with("xElement", "abc").with("yElement", 1.0));
        assert!(matches!(
            codec::encode(&op, Direction::Input, &not_a_number, None),
            Err(CodecError::Coercion { element, source: CoercionError::InvalidLexical { .. } })
                if element == "xElement"
        ));

        let nil = Value::from(Record::new().with("xElement", Value::Nil).with("yElement", 1.0));
        assert!(matches!(
            codec::encode(&op, Direction::Input, &nil, None),
            Err(CodecError::NotNillable { element }) if element == "xElement"
        ));

        let list = Value::from(
            Record::new()
                .with("xElement", vec![Value::from(1), Value::from(2)])
                .with("yElement", 1.0),
        );
        assert!(matches!(
            codec::encode(&op, Direction::Input, &list, None),
            Err(CodecError::TypeMismatch { element, found: "list", .. }) if element == "xElement"
        ));

        assert!(matches!(
            codec::encode(&op, Direction::Input, &Value::from(5), None),
            Err(CodecError::TypeMismatch { expected: "a record", .. })
        ));
    }

    #[test]
    fn test_closed_types_reject_unknown_fields_and_ranges_are_checked() {
        let contract = contract("calculator.wsdl");
        let op = operation(&contract, "DirectoryService", "DirectorySoap12", "GetPerson");

        let extra = Value::from(Record::new().with("id", 1).with("verbose", true));
        assert!(matches!(
            codec::encode(&op, Direction::Input, &extra, None),
            Err(CodecError::UnknownField { field, element }) if field == "verbose" && element == "GetPerson"
        ));

        let born = DateTime::parse_from_rfc3339("1815-12-10T00:00:00Z").unwrap();
        let too_old = Value::from(Record::new().with(
            "person",
            Record::new()
                .with("name", "Ada")
                .with("born", born)
                .with("nickname", Value::Nil)
                .with("age", 300),
        ));
        assert!(matches!(
            codec::encode(&op, Direction::Output, &too_old, None),
            Err(CodecError::Coercion { element, source: CoercionError::OutOfRange { .. } })
                if element == "age"
        ));
    }

    #[test]
    fn test_decoding_rejects_bad_lexical_forms() {
        let contract = contract("doc_literal_test.wsdl");
        let op = operation(&contract, "DocLiteralService", "DocLiteralPort", "myMethod");
        let xml = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:x="http://example.com/doc_literal_test.xsd">
            <soap:Body><x:zElement>True</x:zElement></soap:Body>
        </soap:Envelope>"#;

        assert!(matches!(
            codec::decode(&op, Direction::Output, xml),
            Err(CodecError::Coercion { element, .. }) if element == "zElement"
        ));
    }

    #[test]
    fn test_decoding_a_missing_wrapper_is_an_error() {
        let contract = contract("doc_literal_wrapped_test.wsdl");
        let op = operation(
            &contract,
            "DocLiteralWrappedService",
            "DocLiteralWrappedPort",
            "myMethod",
        );
        let xml = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
            <soap:Body><other/></soap:Body>
        </soap:Envelope>"#;

        assert!(matches!(
            codec::decode(&op, Direction::Input, xml),
            Err(CodecError::UnexpectedElement { expected, found }) if expected == "myMethod" && found == "other"
        ));
    }

    #[test]
    fn test_fault_body_decodes_to_fault() {
        let contract = contract("doc_literal_test.wsdl");
        let op = operation(&contract, "DocLiteralService", "DocLiteralPort", "myMethod");
        let xml = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
            <soap:Body><soap:Fault>
                <faultcode>soap:Server</faultcode>
                <faultstring>boom</faultstring>
                <detail><reason>disk full</reason></detail>
            </soap:Fault></soap:Body>
        </soap:Envelope>"#;

        let Decoded::Fault(fault) = codec::decode(&op, Direction::Output, xml).unwrap() else {
            panic!("expected a fault");
        };
        assert_eq!(fault.code, soapbind_core::FaultCode::Server);
        assert_eq!(fault.string, "boom");
        assert_eq!(
            fault.detail,
            Some(Value::from(Record::new().with("reason", "disk full")))
        );
    }

    #[test]
    fn test_one_way_operation_has_no_output() {
        let contract = contract("calculator.wsdl");
        let op = operation(&contract, "CalculatorService", "CalculatorSoap", "Ping");

        assert!(matches!(
            codec::encode(&op, Direction::Output, &Value::Absent, None),
            Err(CodecError::NoOutput { operation }) if operation == "Ping"
        ));

        let args = Value::from(Record::new().with("message", "hello & bye"));
        let xml = codec::encode_to_string(&op, Direction::Input, &args, None, true).unwrap();
        assert!(xml.contains("<tns:Ping><message>hello &amp; bye</message></tns:Ping>"));
    }
}
