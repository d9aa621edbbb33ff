//! Rendered cluster manifests.
//!
//! Manifests are rendered as plain multi-document YAML strings; the values
//! interpolated here (names, images, hosts) are already validated newtypes,
//! so no escaping is required.

use skylift_core::{AppName, Environment};

/// Namespace for an application, with its quota, default-deny network
/// policy and the role binding that lets the platform manage it.
#[must_use]
pub fn namespace(app: &AppName) -> String {
    format!(
        r"apiVersion: v1
kind: Namespace
metadata:
  name: app-{app}
  labels:
    skylift.dev/app: {app}
---
apiVersion: v1
kind: ResourceQuota
metadata:
  name: app-quota
  namespace: app-{app}
spec:
  hard:
    requests.cpu: '1'
    requests.memory: 1Gi
    limits.cpu: '2'
    limits.memory: 2Gi
    pods: '8'
---
apiVersion: networking.k8s.io/v1
kind: NetworkPolicy
metadata:
  name: default-deny-ingress
  namespace: app-{app}
spec:
  podSelector: {{}}
  policyTypes:
    - Ingress
  ingress:
    - from:
        - namespaceSelector:
            matchLabels:
              kubernetes.io/metadata.name: kube-system
---
apiVersion: rbac.authorization.k8s.io/v1
kind: RoleBinding
metadata:
  name: skylift-controller-binding
  namespace: app-{app}
subjects:
  - kind: ServiceAccount
    name: skylift-controller
    namespace: skylift-system
roleRef:
  kind: ClusterRole
  name: skylift-app-manager
  apiGroup: rbac.authorization.k8s.io
"
    )
}

/// Deployment, Service and Ingress for one environment of an application.
#[must_use]
pub fn deployment(app: &AppName, env: Environment, image: &str, server_ip: &str) -> String {
    let host = format!("{app}{}.{server_ip}.nip.io", env.host_suffix());
    format!(
        r"apiVersion: apps/v1
kind: Deployment
metadata:
  name: {app}-{env}
  namespace: app-{app}
  labels:
    app: {app}
    env: {env}
spec:
  replicas: 1
  selector:
    matchLabels:
      app: {app}
      env: {env}
  template:
    metadata:
      labels:
        app: {app}
        env: {env}
    spec:
      containers:
        - name: app
          image: {image}
          ports:
            - containerPort: 8080
          envFrom:
            - configMapRef:
                name: {app}-env
                optional: true
          resources:
            requests:
              cpu: 50m
              memory: 64Mi
            limits:
              cpu: 500m
              memory: 256Mi
---
apiVersion: v1
kind: Service
metadata:
  name: {app}-{env}
  namespace: app-{app}
spec:
  selector:
    app: {app}
    env: {env}
  ports:
    - port: 80
      targetPort: 8080
---
apiVersion: networking.k8s.io/v1
kind: Ingress
metadata:
  name: {app}-{env}
  namespace: app-{app}
spec:
  rules:
    - host: {host}
      http:
        paths:
          - path: /
            pathType: Prefix
            backend:
              service:
                name: {app}-{env}
                port:
                  number: 80
"
    )
}
