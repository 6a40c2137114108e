//! Wire types of the `gantry.v1.ContainerMaker` service.
//!
//! The message structs and the server glue are maintained by hand in the
//! shape `tonic`/`prost` codegen produces, so the crate builds without a
//! protoc toolchain. Field numbers are part of the wire contract; append,
//! never renumber.

/// One port mapping of a create request. `node_port` is only honored for
/// NodePort services; `0` means unset.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PublishInformation {
    #[prost(int32, tag = "1")]
    pub publish_port: i32,
    #[prost(int32, tag = "2")]
    pub target_port: i32,
    #[prost(string, tag = "3")]
    pub protocol: ::prost::alloc::string::String,
    #[prost(int32, tag = "4")]
    pub node_port: i32,
}

/// Requested compute envelope; empty strings mean unset.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ContainerResources {
    #[prost(string, tag = "1")]
    pub cpu_request: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub cpu_limit: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub memory_request: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub memory_limit: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub ephemeral_request: ::prost::alloc::string::String,
    #[prost(string, tag = "6")]
    pub ephemeral_limit: ::prost::alloc::string::String,
    #[prost(string, tag = "7")]
    pub snapshot_size_limit: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateContainerRequest {
    #[prost(string, tag = "1")]
    pub image_name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub container_name: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub network_name: ::prost::alloc::string::String,
    /// 1 = internal, 2 = cluster-local, 3 = cluster-external, 4 = exposed.
    #[prost(int32, tag = "4")]
    pub exposure_level: i32,
    #[prost(message, repeated, tag = "5")]
    pub publish_information: ::prost::alloc::vec::Vec<PublishInformation>,
    #[prost(map = "string, string", tag = "6")]
    pub environment_variables:
        ::std::collections::HashMap<::prost::alloc::string::String, ::prost::alloc::string::String>,
    #[prost(message, optional, tag = "7")]
    pub resource_requirements: ::core::option::Option<ContainerResources>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListContainerRequest {
    #[prost(string, tag = "1")]
    pub network_name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetContainerRequest {
    #[prost(string, tag = "1")]
    pub container_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub network_name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteContainerRequest {
    #[prost(string, tag = "1")]
    pub container_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub network_name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SaveContainerRequest {
    #[prost(string, tag = "1")]
    pub container_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub network_name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PortInformation {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(int32, tag = "2")]
    pub container_port: i32,
    #[prost(string, tag = "3")]
    pub protocol: ::prost::alloc::string::String,
}

/// A child of a container: a service under an ingress, a pod under a
/// service, or a container of a pod (which also carries its resources).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AssociatedResource {
    #[prost(string, tag = "1")]
    pub resource_name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub resource_type: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "3")]
    pub container_resources: ::core::option::Option<ContainerResources>,
    #[prost(message, repeated, tag = "4")]
    pub associated_resources: ::prost::alloc::vec::Vec<AssociatedResource>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ContainerResponse {
    #[prost(string, tag = "1")]
    pub container_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub container_name: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub container_ip: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub container_network: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "5")]
    pub ports: ::prost::alloc::vec::Vec<PortInformation>,
    #[prost(message, repeated, tag = "6")]
    pub associated_resources: ::prost::alloc::vec::Vec<AssociatedResource>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListContainerResponse {
    #[prost(message, repeated, tag = "1")]
    pub containers: ::prost::alloc::vec::Vec<ContainerResponse>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteContainerResponse {
    #[prost(string, tag = "1")]
    pub container_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub status: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SavedPodResponse {
    #[prost(string, tag = "1")]
    pub pod_name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub namespace_name: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub image_name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SaveContainerResponse {
    #[prost(message, repeated, tag = "1")]
    pub saved_pods: ::prost::alloc::vec::Vec<SavedPodResponse>,
}

/// Server implementations for `gantry.v1.ContainerMaker`.
pub mod container_maker_server {
    #![allow(unused_variables, dead_code, missing_docs, clippy::wildcard_imports)]
    use tonic::codegen::*;

    /// Trait containing the gRPC methods implemented by the request façade.
    #[async_trait]
    pub trait ContainerMaker: std::marker::Send + std::marker::Sync + 'static {
        async fn create_container(
            &self,
            request: tonic::Request<super::CreateContainerRequest>,
        ) -> std::result::Result<tonic::Response<super::ContainerResponse>, tonic::Status>;
        async fn list_container(
            &self,
            request: tonic::Request<super::ListContainerRequest>,
        ) -> std::result::Result<tonic::Response<super::ListContainerResponse>, tonic::Status>;
        async fn get_container(
            &self,
            request: tonic::Request<super::GetContainerRequest>,
        ) -> std::result::Result<tonic::Response<super::ContainerResponse>, tonic::Status>;
        async fn delete_container(
            &self,
            request: tonic::Request<super::DeleteContainerRequest>,
        ) -> std::result::Result<tonic::Response<super::DeleteContainerResponse>, tonic::Status>;
        async fn save_container(
            &self,
            request: tonic::Request<super::SaveContainerRequest>,
        ) -> std::result::Result<tonic::Response<super::SaveContainerResponse>, tonic::Status>;
    }

    #[derive(Debug)]
    pub struct ContainerMakerServer<T> {
        inner: Arc<T>,
        accept_compression_encodings: EnabledCompressionEncodings,
        send_compression_encodings: EnabledCompressionEncodings,
        max_decoding_message_size: Option<usize>,
        max_encoding_message_size: Option<usize>,
    }

    impl<T> ContainerMakerServer<T> {
        pub fn new(inner: T) -> Self {
            Self::from_arc(Arc::new(inner))
        }

        pub fn from_arc(inner: Arc<T>) -> Self {
            Self {
                inner,
                accept_compression_encodings: Default::default(),
                send_compression_encodings: Default::default(),
                max_decoding_message_size: None,
                max_encoding_message_size: None,
            }
        }

        pub fn with_interceptor<F>(inner: T, interceptor: F) -> InterceptedService<Self, F>
        where
            F: tonic::service::Interceptor,
        {
            InterceptedService::new(Self::new(inner), interceptor)
        }

        /// Enable decompressing requests with the given encoding.
        #[must_use]
        pub fn accept_compressed(mut self, encoding: CompressionEncoding) -> Self {
            self.accept_compression_encodings.enable(encoding);
            self
        }

        /// Compress responses with the given encoding, if the client supports it.
        #[must_use]
        pub fn send_compressed(mut self, encoding: CompressionEncoding) -> Self {
            self.send_compression_encodings.enable(encoding);
            self
        }

        /// Limits the maximum size of a decoded message.
        #[must_use]
        pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
            self.max_decoding_message_size = Some(limit);
            self
        }

        /// Limits the maximum size of an encoded message.
        #[must_use]
        pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
            self.max_encoding_message_size = Some(limit);
            self
        }
    }

    impl<T, B> tonic::codegen::Service<http::Request<B>> for ContainerMakerServer<T>
    where
        T: ContainerMaker,
        B: Body + std::marker::Send + 'static,
        B::Error: Into<StdError> + std::marker::Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = std::convert::Infallible;
        type Future = BoxFuture<Self::Response, Self::Error>;

        fn poll_ready(
            &mut self,
            _cx: &mut Context<'_>,
        ) -> Poll<std::result::Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            match req.uri().path() {
                "/gantry.v1.ContainerMaker/createContainer" => {
                    #[allow(non_camel_case_types)]
                    struct createContainerSvc<T: ContainerMaker>(pub Arc<T>);
                    impl<T: ContainerMaker>
                        tonic::server::UnaryService<super::CreateContainerRequest>
                        for createContainerSvc<T>
                    {
                        type Response = super::ContainerResponse;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::CreateContainerRequest>,
                        ) -> Self::Future {
                            let inner = Arc::clone(&self.0);
                            let fut = async move {
                                <T as ContainerMaker>::create_container(&inner, request).await
                            };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let max_decoding_message_size = self.max_decoding_message_size;
                    let max_encoding_message_size = self.max_encoding_message_size;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let method = createContainerSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec)
                            .apply_compression_config(
                                accept_compression_encodings,
                                send_compression_encodings,
                            )
                            .apply_max_message_size_config(
                                max_decoding_message_size,
                                max_encoding_message_size,
                            );
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/gantry.v1.ContainerMaker/listContainer" => {
                    #[allow(non_camel_case_types)]
                    struct listContainerSvc<T: ContainerMaker>(pub Arc<T>);
                    impl<T: ContainerMaker> tonic::server::UnaryService<super::ListContainerRequest>
                        for listContainerSvc<T>
                    {
                        type Response = super::ListContainerResponse;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ListContainerRequest>,
                        ) -> Self::Future {
                            let inner = Arc::clone(&self.0);
                            let fut = async move {
                                <T as ContainerMaker>::list_container(&inner, request).await
                            };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let max_decoding_message_size = self.max_decoding_message_size;
                    let max_encoding_message_size = self.max_encoding_message_size;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let method = listContainerSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec)
                            .apply_compression_config(
                                accept_compression_encodings,
                                send_compression_encodings,
                            )
                            .apply_max_message_size_config(
                                max_decoding_message_size,
                                max_encoding_message_size,
                            );
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/gantry.v1.ContainerMaker/getContainer" => {
                    #[allow(non_camel_case_types)]
                    struct getContainerSvc<T: ContainerMaker>(pub Arc<T>);
                    impl<T: ContainerMaker> tonic::server::UnaryService<super::GetContainerRequest>
                        for getContainerSvc<T>
                    {
                        type Response = super::ContainerResponse;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::GetContainerRequest>,
                        ) -> Self::Future {
                            let inner = Arc::clone(&self.0);
                            let fut = async move {
                                <T as ContainerMaker>::get_container(&inner, request).await
                            };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let max_decoding_message_size = self.max_decoding_message_size;
                    let max_encoding_message_size = self.max_encoding_message_size;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let method = getContainerSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec)
                            .apply_compression_config(
                                accept_compression_encodings,
                                send_compression_encodings,
                            )
                            .apply_max_message_size_config(
                                max_decoding_message_size,
                                max_encoding_message_size,
                            );
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/gantry.v1.ContainerMaker/deleteContainer" => {
                    #[allow(non_camel_case_types)]
                    struct deleteContainerSvc<T: ContainerMaker>(pub Arc<T>);
                    impl<T: ContainerMaker>
                        tonic::server::UnaryService<super::DeleteContainerRequest>
                        for deleteContainerSvc<T>
                    {
                        type Response = super::DeleteContainerResponse;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::DeleteContainerRequest>,
                        ) -> Self::Future {
                            let inner = Arc::clone(&self.0);
                            let fut = async move {
                                <T as ContainerMaker>::delete_container(&inner, request).await
                            };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let max_decoding_message_size = self.max_decoding_message_size;
                    let max_encoding_message_size = self.max_encoding_message_size;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let method = deleteContainerSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec)
                            .apply_compression_config(
                                accept_compression_encodings,
                                send_compression_encodings,
                            )
                            .apply_max_message_size_config(
                                max_decoding_message_size,
                                max_encoding_message_size,
                            );
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/gantry.v1.ContainerMaker/saveContainer" => {
                    #[allow(non_camel_case_types)]
                    struct saveContainerSvc<T: ContainerMaker>(pub Arc<T>);
                    impl<T: ContainerMaker> tonic::server::UnaryService<super::SaveContainerRequest>
                        for saveContainerSvc<T>
                    {
                        type Response = super::SaveContainerResponse;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::SaveContainerRequest>,
                        ) -> Self::Future {
                            let inner = Arc::clone(&self.0);
                            let fut = async move {
                                <T as ContainerMaker>::save_container(&inner, request).await
                            };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let max_decoding_message_size = self.max_decoding_message_size;
                    let max_encoding_message_size = self.max_encoding_message_size;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let method = saveContainerSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec)
                            .apply_compression_config(
                                accept_compression_encodings,
                                send_compression_encodings,
                            )
                            .apply_max_message_size_config(
                                max_decoding_message_size,
                                max_encoding_message_size,
                            );
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                _ => Box::pin(async move {
                    Ok(http::Response::builder()
                        .status(200)
                        .header("grpc-status", tonic::Code::Unimplemented as i32)
                        .header("content-type", "application/grpc")
                        .body(empty_body())
                        .unwrap())
                }),
            }
        }
    }

    impl<T> Clone for ContainerMakerServer<T> {
        fn clone(&self) -> Self {
            let inner = self.inner.clone();
            Self {
                inner,
                accept_compression_encodings: self.accept_compression_encodings,
                send_compression_encodings: self.send_compression_encodings,
                max_decoding_message_size: self.max_decoding_message_size,
                max_encoding_message_size: self.max_encoding_message_size,
            }
        }
    }

    pub const SERVICE_NAME: &str = "gantry.v1.ContainerMaker";

    impl<T> tonic::server::NamedService for ContainerMakerServer<T> {
        const NAME: &'static str = SERVICE_NAME;
    }
}
